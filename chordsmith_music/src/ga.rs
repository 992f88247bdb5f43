// Genetic search for a chord progression.
//
// A chromosome is one chord per melody slot. The population is scored by
// `Evaluator` (a cost: lower is better, 0 is ideal), sorted, and then each
// generation:
//
// 1. The top `survivor_count` chromosomes become breeding stock.
// 2. The back half of the population is overwritten by children of random
//    survivor pairs (single-point crossover, two children per pair, each
//    with its own split point).
// 3. `mutations()` random genes anywhere in the population are replaced
//    with random chords.
//
// The loop stops when the best chromosome costs 0 (converged) or after
// `max_iterations` generations (exhausted). Either way the best chromosome
// of the final sorted population is the result; exhaustion is not an error.
//
// Cost per slot starts at 2. A gene that is a pool chord earns 1 back, and
// earns 1 more if the slot is silent, or if the melody note either lies
// outside every pool chord (a chromatic note no diatonic chord could
// cover) or is one of the gene's own chord tones.
//
// All randomness comes from the caller's `GameRng`.

use crate::chord::{Chord, ChordQuality, PitchClass, build_chord};
use crate::key::{ConsonantPool, Key, build_consonant_pool};
use crate::melody::SlotSequence;
use chordsmith_prng::GameRng;
use serde::{Deserialize, Serialize};

/// Genetic search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    /// Chromosomes per generation.
    pub population_size: usize,
    /// Top chromosomes used as parents.
    pub survivor_count: usize,
    /// Generation cap.
    pub max_iterations: usize,
    /// Single-gene mutations applied per generation. Half the population
    /// when unset.
    pub mutation_count: Option<usize>,
    /// Random chord roots are drawn from `0..=max_root_pitch` before
    /// reduction to a pitch class.
    pub max_root_pitch: u8,
}

impl GaConfig {
    /// Mutations per generation, after defaulting.
    pub fn mutations(&self) -> usize {
        self.mutation_count.unwrap_or(self.population_size / 2)
    }
}

impl Default for GaConfig {
    fn default() -> Self {
        GaConfig {
            population_size: 256,
            survivor_count: 32,
            max_iterations: 10_000,
            mutation_count: None,
            max_root_pitch: 120,
        }
    }
}

/// One candidate accompaniment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chromosome {
    pub genes: Vec<Chord>,
    /// Cached cost from the last `Evaluator::evaluate`; 0 until evaluated.
    pub fitness: u32,
}

impl Chromosome {
    /// `size` uniformly random chords.
    pub fn random(size: usize, max_root_pitch: u8, rng: &mut GameRng) -> Self {
        Chromosome {
            genes: (0..size).map(|_| random_chord(max_root_pitch, rng)).collect(),
            fitness: 0,
        }
    }

    pub fn from_genes(genes: Vec<Chord>) -> Self {
        Chromosome { genes, fitness: 0 }
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

fn random_chord(max_root_pitch: u8, rng: &mut GameRng) -> Chord {
    let root = rng.range_usize_inclusive(0, max_root_pitch as usize) as i32;
    let quality = ChordQuality::ALL[rng.range_usize(0, ChordQuality::ALL.len())];
    build_chord(root, quality)
}

/// Fitness context for one run: the key's consonant pool and the melody
/// slots every chromosome is scored against.
#[derive(Debug, Clone)]
pub struct Evaluator {
    pool: ConsonantPool,
    slots: SlotSequence,
}

impl Evaluator {
    pub fn new(key: Key, slots: SlotSequence) -> Self {
        Evaluator {
            pool: build_consonant_pool(key),
            slots,
        }
    }

    pub fn pool(&self) -> &ConsonantPool {
        &self.pool
    }

    /// Chromosome length this evaluator expects.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Score `chromosome` and cache the cost in its `fitness`.
    pub fn evaluate(&self, chromosome: &mut Chromosome) -> u32 {
        chromosome.fitness = self.cost(&chromosome.genes);
        chromosome.fitness
    }

    /// Cost of a chord sequence. Genes past the end of the slot sequence
    /// are scored against silence.
    pub fn cost(&self, genes: &[Chord]) -> u32 {
        let mut cost = 2 * genes.len() as u32;
        for (slot, gene) in genes.iter().enumerate() {
            if !self.pool.contains(gene) {
                continue;
            }
            cost -= 1;

            let Some(pitch) = self.slots.get(slot) else {
                cost -= 1;
                continue;
            };
            let pc = PitchClass::from_midi(pitch);
            let outside_pool = !self.pool.sounds(pc);
            let in_gene = gene.contains(pc);
            if outside_pool || in_gene {
                cost -= 1;
            }
        }
        cost
    }
}

/// Sort `population` by ascending cost (stable) and return the best
/// `count` chromosomes.
pub fn select_survivors(population: &mut [Chromosome], count: usize) -> &[Chromosome] {
    population.sort_by_key(|c| c.fitness);
    &population[..count.min(population.len())]
}

/// Single-point crossover at a random split in `0..len`.
pub fn crossover(a: &Chromosome, b: &Chromosome, rng: &mut GameRng) -> Chromosome {
    if a.is_empty() {
        return Chromosome::from_genes(Vec::new());
    }
    let point = rng.range_usize(0, a.len());
    crossover_at(a, b, point)
}

/// Child with `a`'s genes before `point` and `b`'s from `point` on.
pub fn crossover_at(a: &Chromosome, b: &Chromosome, point: usize) -> Chromosome {
    debug_assert_eq!(a.len(), b.len(), "parents must have equal length");
    let point = point.min(a.len()).min(b.len());
    let genes = a.genes[..point]
        .iter()
        .chain(&b.genes[point..])
        .copied()
        .collect();
    Chromosome::from_genes(genes)
}

/// Overwrite `population[start..]` with children of the first
/// `survivor_count` chromosomes, two complementary children per parent
/// pair. Parents are distinct whenever at least two survivors exist; a
/// lone survivor is crossed with itself, which clones it.
pub fn repopulate(
    population: &mut [Chromosome],
    survivor_count: usize,
    start: usize,
    rng: &mut GameRng,
) {
    let (head, tail) = population.split_at_mut(start.min(population.len()));
    let survivors = &head[..survivor_count.min(head.len())];
    if survivors.is_empty() {
        log::warn!("No survivors before index {start}; skipping repopulation");
        return;
    }
    if survivors.len() < 2 {
        log::warn!("Single survivor; children will be clones");
    }

    for pair in tail.chunks_mut(2) {
        let (p1, p2) = pick_parents(survivors.len(), rng);
        pair[0] = crossover(&survivors[p1], &survivors[p2], rng);
        if let Some(second) = pair.get_mut(1) {
            *second = crossover(&survivors[p2], &survivors[p1], rng);
        }
    }
}

/// Two uniformly random, distinct indices in `0..n` (the same index twice
/// when `n == 1`). The second draw skips over the first instead of
/// retrying, so it always terminates.
fn pick_parents(n: usize, rng: &mut GameRng) -> (usize, usize) {
    let first = rng.range_usize(0, n);
    if n < 2 {
        return (first, first);
    }
    let mut second = rng.range_usize(0, n - 1);
    if second >= first {
        second += 1;
    }
    (first, second)
}

/// Apply `count` independent single-gene mutations at random positions.
pub fn mutate(population: &mut [Chromosome], count: usize, max_root_pitch: u8, rng: &mut GameRng) {
    if population.is_empty() {
        return;
    }
    for _ in 0..count {
        let target = rng.range_usize(0, population.len());
        let chromosome = &mut population[target];
        if chromosome.is_empty() {
            continue;
        }
        let gene = rng.range_usize(0, chromosome.len());
        chromosome.genes[gene] = random_chord(max_root_pitch, rng);
    }
}

/// Where the search loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Running,
    /// The best chromosome reached cost 0.
    Converged,
    /// The generation cap was hit first.
    Exhausted,
}

/// Result of a search.
#[derive(Debug, Clone)]
pub struct GaResult {
    pub best: Chromosome,
    pub state: SearchState,
    /// Generations evaluated.
    pub iterations: usize,
    /// Best cost of the first generation.
    pub initial_fitness: u32,
    pub final_fitness: u32,
}

/// Run the genetic search to convergence or the generation cap.
pub fn evolve(evaluator: &Evaluator, config: &GaConfig, rng: &mut GameRng) -> GaResult {
    let size = evaluator.slot_count();
    let population_size = config.population_size.max(1);
    let mut population: Vec<Chromosome> = (0..population_size)
        .map(|_| Chromosome::random(size, config.max_root_pitch, rng))
        .collect();

    let mut state = SearchState::Running;
    let mut iterations = 0;
    let mut initial_fitness = None;

    while state == SearchState::Running {
        for chromosome in population.iter_mut() {
            evaluator.evaluate(chromosome);
        }
        let survivor_count = select_survivors(&mut population, config.survivor_count).len();
        iterations += 1;

        let best = population[0].fitness;
        let initial = *initial_fitness.get_or_insert(best);

        if best == 0 {
            state = SearchState::Converged;
        } else if iterations >= config.max_iterations {
            state = SearchState::Exhausted;
        } else {
            if iterations % 500 == 0 {
                log::debug!("Generation {iterations}: best cost {best} (started at {initial})");
            }
            let half = population.len() / 2;
            repopulate(&mut population, survivor_count, half, rng);
            mutate(&mut population, config.mutations(), config.max_root_pitch, rng);
        }
    }

    let best = population.swap_remove(0);
    let final_fitness = best.fitness;
    match state {
        SearchState::Converged => {
            log::info!("Converged after {iterations} generations");
        }
        _ => log::info!(
            "Stopped after {iterations} generations with best cost {final_fitness}"
        ),
    }

    GaResult {
        best,
        state,
        iterations,
        initial_fitness: initial_fitness.unwrap_or(final_fitness),
        final_fitness,
    }
}
