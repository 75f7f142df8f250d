#![allow(missing_docs)]

use strand_integration_test::{Person, Reading, person_with};
use strand_serialize::Ptr;

/// Integers spread over every varint length, small values first.
#[must_use]
pub fn spread_integers(count: usize) -> Vec<u64> {
    (0..count).map(|i| 1u64 << ((i * 7) % 64)).collect()
}

/// Readings with short sensor names and `samples` alternating-sign samples.
#[must_use]
pub fn readings(count: usize, samples: usize) -> Vec<Reading> {
    (0..count)
        .map(|i| {
            let values: Vec<i32> = (0..samples)
                .map(|j| {
                    let magnitude =
                        i32::try_from(i * samples + j).unwrap_or(i32::MAX);
                    if j % 2 == 0 { magnitude } else { -magnitude }
                })
                .collect();
            Reading::new(&format!("sensor-{i}"), &values)
        })
        .collect()
}

/// A ring of `len` people, each befriending the next and the first.
///
/// Every pointer past the first occurrence is a back reference, which is
/// the worst case for the identity maps.
#[must_use]
pub fn ring(len: usize) -> Ptr<Person> {
    fn link(
        index: usize,
        len: usize,
        head: &Ptr<Person>,
    ) -> Vec<Option<Ptr<Person>>> {
        if index + 1 == len {
            return vec![Some(head.clone())];
        }

        let age = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let next = person_with("member", age, |_| link(index + 1, len, head));
        vec![Some(next), Some(head.clone())]
    }

    person_with("head", 0, |head| link(0, len.max(1), head))
}
