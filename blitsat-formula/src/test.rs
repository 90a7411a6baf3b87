//! Formula generators for property based tests.
use proptest::{prelude::*, *};

use rand::distributions::Bernoulli;
use rand::seq::SliceRandom;

use crate::cnf::CnfFormula;
use crate::lit::Lit;

/// One literal per variable, with the given polarities.
fn planted(polarity: Vec<bool>) -> Vec<Lit> {
    polarity
        .into_iter()
        .enumerate()
        .map(|(index, polarity)| Lit::from_index(index, polarity))
        .collect()
}

/// Shuffle clauses and the literals within them.
fn shuffled(mut clauses: Vec<Vec<Lit>>, rng: &mut impl Rng) -> CnfFormula {
    for clause in clauses.iter_mut() {
        clause.shuffle(rng);
    }
    clauses.shuffle(rng);
    CnfFormula::from(clauses)
}

/// Generate small hard unsat instances.
///
/// Follows the sgen construction (http://www.cs.qub.ac.uk/~i.spence/sgen/) using random partitions
/// of the variables into groups of four. Every group gets all ternary clauses over its literals
/// once for the planted polarity and once for the inverted polarity. The one variable left over is
/// combined with the first four literals of the partition.
pub fn sgen_unsat_formula(
    blocks: impl Strategy<Value = usize>,
) -> impl Strategy<Value = CnfFormula> {
    blocks.prop_flat_map(|blocks| {
        collection::vec(bool::ANY, blocks * 4 + 1).prop_perturb(|polarity, mut rng| {
            let mut lits = planted(polarity);
            let mut clauses: Vec<Vec<Lit>> = vec![];

            let triples = |group: &[Lit], invert: bool, clauses: &mut Vec<Vec<Lit>>| {
                for a in 0..group.len() {
                    for b in 0..a {
                        for c in 0..b {
                            let clause = [group[a], group[b], group[c]];
                            clauses.push(clause.iter().map(|&lit| lit ^ invert).collect());
                        }
                    }
                }
            };

            for &invert in [false, true].iter() {
                lits.shuffle(&mut rng);
                let (rest, groups) = lits.split_last().unwrap();
                for group in groups.chunks_exact(4) {
                    triples(group, invert, &mut clauses);
                }
                for b in 0..4 {
                    for c in 0..b {
                        clauses.push(vec![*rest ^ invert, lits[b] ^ invert, lits[c] ^ invert]);
                    }
                }
            }

            shuffled(clauses, &mut rng)
        })
    })
}

/// Generate a sat instance.
///
/// A random full assignment is planted first. Every clause contains at least one literal that is
/// true under that assignment. Every other variable occurs with probability `density` and is made
/// false under the planted assignment with probability `polarity_dist`.
pub fn sat_formula(
    vars: impl Strategy<Value = usize>,
    clause_count: impl Strategy<Value = usize>,
    density: impl Strategy<Value = f64>,
    polarity_dist: impl Strategy<Value = f64>,
) -> impl Strategy<Value = CnfFormula> {
    (vars, clause_count, density, polarity_dist).prop_flat_map(
        |(vars, clause_count, density, polarity_dist)| {
            let density = Bernoulli::new(density).unwrap();
            let polarity_dist = Bernoulli::new(polarity_dist).unwrap();

            collection::vec(bool::ANY, vars).prop_perturb(move |polarity, mut rng| {
                let model = planted(polarity);

                let clauses = (0..clause_count)
                    .map(|_| {
                        let &satisfied = model.choose(&mut rng).unwrap();
                        let mut clause = vec![satisfied];
                        for &lit in model.iter() {
                            if lit != satisfied && rng.sample(density) {
                                clause.push(lit ^ rng.sample(polarity_dist));
                            }
                        }
                        clause
                    })
                    .collect();

                shuffled(clauses, &mut rng)
            })
        },
    )
}

/// Generates a conditional pigeon hole principle formula.
///
/// There are `columns + 1` columns of `columns + extra_rows` variables each. The first column
/// holds the enable literals. Every enabled row needs a column of its own and there are only
/// `columns` columns to go around. Returns the enable literals, the number of columns and the
/// formula.
///
/// Assuming more than `columns` enable literals makes the formula unsatisfiable.
pub fn conditional_pigeon_hole(
    columns: impl Strategy<Value = usize>,
    extra_rows: impl Strategy<Value = usize>,
) -> impl Strategy<Value = (Vec<Lit>, usize, CnfFormula)> {
    (columns, extra_rows).prop_flat_map(|(columns, extra_rows)| {
        let rows = columns + extra_rows;
        let vars = (columns + 1) * rows;

        collection::vec(bool::ANY, vars).prop_perturb(move |polarity, mut rng| {
            let lits = planted(polarity);
            let cell = |column: usize, row: usize| lits[column * rows + row];
            let mut clauses: Vec<Vec<Lit>> = vec![];

            for column in 1..columns + 1 {
                for row in 0..rows {
                    for other in 0..row {
                        clauses.push(vec![cell(column, row), cell(column, other)]);
                    }
                }
            }

            for row in 0..rows {
                clauses.push((0..columns + 1).map(|column| !cell(column, row)).collect());
            }

            let enable = lits[0..rows].to_owned();
            (enable, columns, shuffled(clauses, &mut rng))
        })
    })
}

/// Generates the pigeon hole principle formula for `holes + 1` pigeons and `holes` holes.
///
/// The formula is unsatisfiable for every `holes`, including 0 where it consists of a single empty
/// clause.
pub fn pigeon_hole(holes: usize) -> CnfFormula {
    let pigeons = holes + 1;
    let var = |pigeon: usize, hole: usize| Lit::from_index(pigeon * holes + hole, true);

    let mut clauses: Vec<Vec<Lit>> = vec![];

    for pigeon in 0..pigeons {
        clauses.push((0..holes).map(|hole| var(pigeon, hole)).collect());
    }

    for hole in 0..holes {
        for a in 0..pigeons {
            for b in 0..a {
                clauses.push(vec![!var(a, hole), !var(b, hole)]);
            }
        }
    }

    CnfFormula::from(clauses)
}

/// Generate a uniform random 3-SAT instance.
///
/// Each clause has three distinct variables with random polarities. The generated formulas may be
/// satisfiable or unsatisfiable.
pub fn random_3sat_formula(
    vars: impl Strategy<Value = usize>,
    clause_count: impl Strategy<Value = usize>,
) -> impl Strategy<Value = CnfFormula> {
    (vars, clause_count).prop_flat_map(|(vars, clause_count)| {
        let vars = vars.max(3);
        Just(()).prop_perturb(move |_, mut rng| {
            let indices: Vec<usize> = (0..vars).collect();
            let mut clauses: Vec<Vec<Lit>> = vec![];
            for _ in 0..clause_count {
                let clause = indices
                    .choose_multiple(&mut rng, 3)
                    .map(|&index| Lit::from_index(index, rng.gen()))
                    .collect();
                clauses.push(clause);
            }
            let mut formula = CnfFormula::from(clauses);
            formula.set_var_count(vars);
            formula
        })
    })
}
