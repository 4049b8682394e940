//! Grouping of adjacent boolean fields for bit-packed transmission.
//!
//! A cluster carries between 2 and 8 singular boolean fields that are
//! adjacent in declared order. Clustering is a pure function of the field
//! list; values only matter later, when the bitmaps are emitted.

use crate::schema::{Cardinality, Kind, MessageDescriptor};

/// Largest number of booleans carried by one cluster.
pub const MAX_CLUSTER: usize = 8;

/// Declared-field indices of one run of adjacent booleans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub fields: Vec<usize>,
}

/// Collect the boolean clusters of a message.
///
/// A run is cut at 8 members; a non-boolean field ends the current run,
/// which is kept only if it has at least 2 members.
#[must_use]
pub fn clusters(descriptor: &MessageDescriptor) -> Vec<Cluster> {
    let mut out = Vec::new();
    let mut run: Vec<usize> = Vec::new();
    for (index, field) in descriptor.fields().iter().enumerate() {
        let boolean = field.kind == Kind::Bool && field.cardinality == Cardinality::Singular;
        if boolean {
            run.push(index);
            if run.len() == MAX_CLUSTER {
                out.push(Cluster {
                    fields: std::mem::take(&mut run),
                });
            }
        } else {
            flush(&mut run, &mut out);
        }
    }
    flush(&mut run, &mut out);
    out
}

fn flush(run: &mut Vec<usize>, out: &mut Vec<Cluster>) {
    if run.len() >= 2 {
        out.push(Cluster {
            fields: std::mem::take(run),
        });
    } else {
        run.clear();
    }
}
