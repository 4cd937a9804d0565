#![cfg(not(feature = "shuttle"))]

use std::thread;
use std::time::Duration;

use handoff_list::scenario::{self, ScenarioConfig};
use handoff_list::HandoffList;
use rand::Rng;

fn assert_descending(seen: &[usize]) {
    for pair in seen.windows(2) {
        assert!(pair[0] > pair[1], "out of order or duplicated: {seen:?}");
    }
}

#[test]
fn test_reader_and_paced_deleter_drain_140_nodes() {
    let config = ScenarioConfig {
        pause: Duration::from_millis(1),
        seed: Some(0x5eed),
        ..ScenarioConfig::default()
    };
    let report = scenario::run(&config);
    assert_eq!(report.removed.len(), 140);
    assert!(report.removed.iter().all(|word| (3..=9).contains(&word.len())));
}

#[test]
fn test_many_readers_and_deleters() {
    let nodes = 2_000;
    let list = HandoffList::build(0..nodes);
    let removed: Vec<usize> = thread::scope(|scope| {
        for _ in 0..2 {
            scope.spawn(|| {
                while !list.is_empty() {
                    let seen: Vec<usize> = list.iter().collect();
                    assert_descending(&seen);
                }
            });
        }
        let deleters: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let mut rng = rand::thread_rng();
                    let mut removed = Vec::new();
                    'pick: loop {
                        let len = list.len();
                        if len == 0 {
                            break;
                        }
                        let position = rng.gen_range(0..len.min(16));
                        let Some(mut cursor) = list.cursor() else {
                            break;
                        };
                        for _ in 0..position {
                            cursor = match cursor.advance() {
                                Some(next) => next,
                                None => continue 'pick,
                            };
                        }
                        removed.push(cursor.remove());
                    }
                    removed
                })
            })
            .collect();
        deleters
            .into_iter()
            .flat_map(|deleter| deleter.join().unwrap())
            .collect()
    });

    let mut removed = removed;
    removed.sort_unstable();
    assert_eq!(removed, (0..nodes).collect::<Vec<_>>());
}

#[test]
fn test_adjacent_deletions() {
    let nodes = 1_000;
    let mut list = HandoffList::build(0..nodes);
    let removed: Vec<usize> = thread::scope(|scope| {
        let list = &list;
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                scope.spawn(move || {
                    let mut removed = Vec::new();
                    while let Some(cursor) = list.cursor() {
                        // Half the workers take the head, the rest its successor.
                        let target = if worker % 2 == 0 {
                            cursor
                        } else {
                            match cursor.advance() {
                                Some(next) => next,
                                None => {
                                    thread::yield_now();
                                    continue;
                                }
                            }
                        };
                        removed.push(target.remove());
                    }
                    removed
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect()
    });

    let mut removed = removed;
    removed.sort_unstable();
    assert_eq!(removed, (0..nodes).collect::<Vec<_>>());
    assert_eq!(list.check_integrity(), Ok(0));
}

#[test]
fn test_partial_drain_keeps_links_consistent() {
    let nodes = 500;
    let mut list = HandoffList::build(0..nodes);
    thread::scope(|scope| {
        let list = &list;
        for worker in 0..3 {
            scope.spawn(move || {
                for _ in 0..50 {
                    let Some(mut cursor) = list.cursor() else {
                        return;
                    };
                    for _ in 0..(worker * 7) {
                        cursor = match cursor.advance() {
                            Some(next) => next,
                            None => return,
                        };
                    }
                    cursor.remove();
                }
            });
        }
    });

    assert_eq!(list.len(), nodes - 150);
    assert_eq!(list.check_integrity(), Ok(nodes - 150));
    let remaining = list.into_vec();
    assert_descending(&remaining);
    assert_eq!(remaining.len(), nodes - 150);
}
