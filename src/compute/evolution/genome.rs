//! Genome manipulation utilities for evolutionary search.
//!
//! Provides random generation, crossover, mutation and expansion. Every
//! operator preserves genome length except [`GenomeRng::expand`].

use crate::schema::{Genome, MutationPolicy};
use rand::prelude::*;

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A fresh gene in [0, 1).
    #[inline]
    pub fn gene(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Uniform index in `0..len`. `len` must be positive.
    #[inline]
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// True with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.r#gen::<f64>() < p
    }

    /// Generate a genome of `length` random genes.
    pub fn random_genome(&mut self, length: usize) -> Genome {
        Genome::from_genes((0..length).map(|_| self.gene()).collect())
    }

    /// Single-point crossover.
    ///
    /// The first child takes the head of `parent1` and the tail of
    /// `parent2`; the second child is the complement.
    pub fn crossover(&mut self, parent1: &Genome, parent2: &Genome) -> (Genome, Genome) {
        let len = parent1.len().min(parent2.len());
        if len == 0 {
            return (
                Genome::from_genes(parent1.genes.clone()),
                Genome::from_genes(parent2.genes.clone()),
            );
        }

        let split = self.index(len);
        let (head1, tail1) = parent1.genes.split_at(split);
        let (head2, tail2) = parent2.genes.split_at(split);

        let child1 = head1.iter().chain(tail2).copied().collect();
        let child2 = head2.iter().chain(tail1).copied().collect();

        (Genome::from_genes(child1), Genome::from_genes(child2))
    }

    /// Mutate a genome in place.
    pub fn mutate(&mut self, genome: &mut Genome, rate: f64, policy: MutationPolicy) {
        if genome.is_empty() {
            return;
        }

        match policy {
            MutationPolicy::PerGene => self.replace_genes(genome, rate),
            MutationPolicy::ShiftOrReplace => match self.index(3) {
                0 => self.insert_gene(genome),
                1 => self.delete_gene(genome),
                _ => self.replace_genes(genome, rate),
            },
        }
    }

    /// Replace each gene with probability `rate`.
    fn replace_genes(&mut self, genome: &mut Genome, rate: f64) {
        for gene in genome.genes.iter_mut() {
            if self.chance(rate) {
                *gene = self.gene();
            }
        }
    }

    /// Overwrite a random position and shift the rest right, dropping the last gene.
    fn insert_gene(&mut self, genome: &mut Genome) {
        let at = self.index(genome.len());
        let gene = self.gene();
        genome.genes.insert(at, gene);
        genome.genes.pop();
    }

    /// Remove a random position, shifting left and appending a fresh gene.
    fn delete_gene(&mut self, genome: &mut Genome) {
        let at = self.index(genome.len());
        genome.genes.remove(at);
        let gene = self.gene();
        genome.genes.push(gene);
    }

    /// Grow a genome to `length`, backfilling with random genes.
    pub fn expand(&mut self, genome: &mut Genome, length: usize) {
        while genome.genes.len() < length {
            let gene = self.gene();
            genome.genes.push(gene);
        }
    }
}
