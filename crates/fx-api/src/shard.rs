//! N-of-M sharding of service IDs across exporter replicas.
//!
//! Membership is `xxh64(id, seed = 0) % M == N - 1` over the raw ID bytes.
//! Replicas configured `1/M ..= M/M` partition any ID set without overlap or
//! gaps. Changing the hash reassigns services between replicas, so it must
//! stay fixed across releases.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use twox_hash::XxHash64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShardError {
    #[error("shard {0:?} is not of the form N/M")]
    Format(String),
    #[error("shard {n}/{m} out of range, need 1 <= N <= M")]
    Range { n: u64, m: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub n: u64,
    pub m: u64,
}

impl Default for Shard {
    /// `1/1`: every service belongs.
    fn default() -> Self {
        Self { n: 1, m: 1 }
    }
}

impl Shard {
    /// Parse `"N/M"`, tolerating whitespace around either number.
    pub fn parse(text: &str) -> Result<Self, ShardError> {
        let format = || ShardError::Format(text.to_string());
        let (n, m) = text.split_once('/').ok_or_else(format)?;
        let n: u64 = n.trim().parse().map_err(|_| format())?;
        let m: u64 = m.trim().parse().map_err(|_| format())?;
        if n < 1 || n > m {
            return Err(ShardError::Range { n, m });
        }
        Ok(Self { n, m })
    }

    #[must_use]
    pub fn includes(&self, id: &str) -> bool {
        if self.m <= 1 {
            return true;
        }
        let bucket = XxHash64::oneshot(0, id.as_bytes()) % self.m;
        self.n.checked_sub(1) == Some(bucket)
    }
}

impl FromStr for Shard {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.n, self.m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S1: &str = "AbcDef123ghiJKlmnOPsq";
    const S2: &str = "XXXXXXXXXXXXXXXXXXXXXX";

    #[test]
    fn parse_accepts() {
        assert_eq!(Shard::parse("1/2"), Ok(Shard { n: 1, m: 2 }));
        assert_eq!(Shard::parse("2/2"), Ok(Shard { n: 2, m: 2 }));
        assert_eq!(Shard::parse(" 2 / 2 "), Ok(Shard { n: 2, m: 2 }));
    }

    #[test]
    fn parse_rejects() {
        assert!(matches!(Shard::parse(""), Err(ShardError::Format(_))));
        assert!(matches!(Shard::parse("123"), Err(ShardError::Format(_))));
        assert!(matches!(Shard::parse("1/2/3"), Err(ShardError::Format(_))));
        assert!(matches!(Shard::parse("a/b"), Err(ShardError::Format(_))));
        assert!(matches!(Shard::parse("-1/2"), Err(ShardError::Format(_))));
        assert_eq!(Shard::parse("0/2"), Err(ShardError::Range { n: 0, m: 2 }));
        assert_eq!(Shard::parse("3/2"), Err(ShardError::Range { n: 3, m: 2 }));
    }

    #[test]
    fn unsharded_includes_everything() {
        for shard in [Shard::default(), Shard { n: 0, m: 0 }] {
            assert!(shard.includes(S1));
            assert!(shard.includes(S2));
            assert!(shard.includes(""));
        }
    }

    #[test]
    fn fixture_assignment_is_stable() {
        let pick = |n| {
            let shard = Shard { n, m: 3 };
            [S1, S2]
                .into_iter()
                .filter(|id| shard.includes(id))
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(1), vec![S1]);
        assert_eq!(pick(2), vec![S2]);
        assert!(pick(3).is_empty());
    }

    #[test]
    fn shards_partition_ids() {
        let ids: Vec<String> = (0..500).map(|i| format!("svc-{i:04}")).collect();
        for m in 1..=7u64 {
            let mut owners = vec![0u32; ids.len()];
            for n in 1..=m {
                let shard = Shard { n, m };
                for (i, id) in ids.iter().enumerate() {
                    if shard.includes(id) {
                        owners[i] += 1;
                    }
                }
            }
            assert!(owners.iter().all(|&c| c == 1), "m={m}");
        }
    }

    #[test]
    fn display_round_trips() {
        let s: Shard = "3/4".parse().unwrap();
        assert_eq!(s.to_string(), "3/4");
    }
}
