//! The reader/deleter workload the list was built for.
//!
//! A list of random lowercase words is shared by two threads. The reader
//! walks it end to end over and over, logging the concatenation of every pass.
//! The deleter removes a node at a random position, pauses, and repeats. Both
//! stop once the list is empty.

use std::str::FromStr;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::{AccessorId, ConfigError, HandoffList};

/// Parameters of a scenario run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// Number of words the list starts with.
    pub nodes: usize,
    /// Shortest word length, inclusive.
    pub min_len: usize,
    /// Longest word length, inclusive.
    pub max_len: usize,
    /// Sleep between two deletions.
    pub pause: Duration,
    /// Seed for reproducible runs. Entropy is used when absent.
    pub seed: Option<u64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            nodes: 140,
            min_len: 3,
            max_len: 9,
            pause: Duration::from_millis(500),
            seed: None,
        }
    }
}

impl ScenarioConfig {
    /// Reads `HANDOFF_NODES`, `HANDOFF_MIN_LEN`, `HANDOFF_MAX_LEN`,
    /// `HANDOFF_PAUSE_MS` and `HANDOFF_SEED`, falling back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), with variables taken from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ScenarioConfig::default();
        let config = ScenarioConfig {
            nodes: parse(&lookup, "HANDOFF_NODES")?.unwrap_or(defaults.nodes),
            min_len: parse(&lookup, "HANDOFF_MIN_LEN")?.unwrap_or(defaults.min_len),
            max_len: parse(&lookup, "HANDOFF_MAX_LEN")?.unwrap_or(defaults.max_len),
            pause: parse(&lookup, "HANDOFF_PAUSE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.pause),
            seed: parse(&lookup, "HANDOFF_SEED")?,
        };
        if config.min_len > config.max_len {
            return Err(ConfigError::LengthRange {
                min: config.min_len,
                max: config.max_len,
            });
        }
        Ok(config)
    }
}

fn parse<F, V>(lookup: &F, var: &'static str) -> Result<Option<V>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    V: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::Invalid { var, value }),
        },
    }
}

/// Outcome of [`run`].
#[derive(Debug)]
pub struct ScenarioReport {
    /// Complete traversals made by the reader.
    pub passes: usize,
    /// Words in the order they were deleted.
    pub removed: Vec<String>,
}

/// A lowercase ASCII word with a length in `min_len..=max_len`.
pub fn random_word<R>(rng: &mut R, min_len: usize, max_len: usize) -> String
where
    R: Rng + ?Sized,
{
    let len = rng.gen_range(min_len..=max_len);
    (0..len).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect()
}

/// Runs one reader and one deleter over a fresh list until it is empty.
pub fn run(config: &ScenarioConfig) -> ScenarioReport {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let words = (0..config.nodes)
        .map(|_| random_word(&mut rng, config.min_len, config.max_len));
    let list = HandoffList::build(words);
    let deleter_rng = StdRng::seed_from_u64(rng.gen());
    info!(nodes = list.len(), "starting reader and deleter");

    thread::scope(|scope| {
        let reader = scope.spawn(|| read_until_empty(&list));
        let deleter = scope.spawn(|| delete_until_empty(&list, deleter_rng, config.pause));
        let passes = reader
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        let removed = deleter
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        ScenarioReport { passes, removed }
    })
}

/// Concatenates the whole list on every pass until it is empty. Returns the
/// number of passes.
pub fn read_until_empty(list: &HandoffList<String>) -> usize {
    let who = AccessorId::current();
    let mut passes = 0;
    while !list.is_empty() {
        let mut concatenated = String::new();
        let mut current = list.begin(who);
        while let Some(word) = current {
            concatenated.push_str(&word);
            current = list.advance(who);
        }
        passes += 1;
        info!(%who, pass = passes, %concatenated, "traversal complete");
    }
    info!(%who, "list empty, reader stopping");
    passes
}

/// Removes a node at a random position, sleeping `pause` after each removal,
/// until the list is empty. Returns the removed words in order.
pub fn delete_until_empty<R>(list: &HandoffList<String>, mut rng: R, pause: Duration) -> Vec<String>
where
    R: Rng,
{
    let who = AccessorId::current();
    let mut removed = Vec::new();
    loop {
        let len = list.len();
        if len == 0 {
            break;
        }
        let position = rng.gen_range(0..len);
        if list.begin(who).is_none() {
            continue;
        }
        if (0..position).any(|_| list.advance(who).is_none()) {
            // Other deleters shrank the list under us.
            trace!(%who, position, "ran off the end, picking again");
            continue;
        }
        let word = list.remove_here(who);
        debug!(%who, position, %word, "removed node");
        removed.push(word);
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }
    info!(%who, removed = removed.len(), "list empty, deleter stopping");
    removed
}

#[cfg(all(test, not(feature = "shuttle")))]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_random_word_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let word = random_word(&mut rng, 3, 9);
            assert!((3..=9).contains(&word.len()), "{word}");
            assert!(word.bytes().all(|b| b.is_ascii_lowercase()), "{word}");
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = ScenarioConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(config.nodes, 140);
        assert_eq!(config.pause, Duration::from_millis(500));
    }

    #[test]
    fn test_config_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HANDOFF_NODES", "12"),
            ("HANDOFF_PAUSE_MS", "0"),
            ("HANDOFF_SEED", " 7 "),
            ("HANDOFF_MAX_LEN", "4"),
        ]
        .into_iter()
        .collect();
        let config =
            ScenarioConfig::from_lookup(|var| vars.get(var).map(|v| v.to_string())).unwrap();
        assert_eq!(
            config,
            ScenarioConfig {
                nodes: 12,
                min_len: 3,
                max_len: 4,
                pause: Duration::ZERO,
                seed: Some(7),
            }
        );
    }

    #[test]
    fn test_config_rejects_garbage() {
        let err = ScenarioConfig::from_lookup(|var| {
            (var == "HANDOFF_NODES").then(|| "many".to_string())
        })
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "HANDOFF_NODES",
                value: "many".to_string(),
            }
        );
    }

    #[test]
    fn test_config_rejects_empty_length_range() {
        let err = ScenarioConfig::from_lookup(|var| {
            (var == "HANDOFF_MIN_LEN").then(|| "10".to_string())
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::LengthRange { min: 10, max: 9 });
    }

    #[test]
    fn test_run_empties_the_list() {
        let config = ScenarioConfig {
            nodes: 40,
            pause: Duration::ZERO,
            seed: Some(1),
            ..ScenarioConfig::default()
        };
        let report = run(&config);
        assert_eq!(report.removed.len(), 40);
    }

    #[test]
    fn test_run_with_no_nodes() {
        let config = ScenarioConfig {
            nodes: 0,
            ..ScenarioConfig::default()
        };
        let report = run(&config);
        assert_eq!(report.passes, 0);
        assert!(report.removed.is_empty());
    }
}
