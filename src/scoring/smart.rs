//! SMART-style term weighting triples for k-NN (§4.8): a `ddd.qqq` config
//! string picks independent term-frequency schemes for the document side
//! and the query side (the `.idf`/`.norm` letters are folded into the
//! shared cosine helper rather than modeled as separate stages here).

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfScheme {
    /// `n` — raw count.
    Natural,
    /// `b` — binary presence.
    Boolean,
    /// `l` — `1 + ln(count)` for count > 0, else 0.
    LogAverage,
    /// `a` — augmented: `0.5 + 0.5 * count/max_count`, where `max_count` is
    /// the largest term count anywhere in the same document (or query).
    Augmented,
}

impl TfScheme {
    /// `max_count` is the largest raw term count in the same vector
    /// (document or query) this `count` comes from — required by
    /// `Augmented`, ignored by the other schemes.
    pub fn weight(&self, count: u32, max_count: u32) -> f64 {
        match self {
            TfScheme::Natural => count as f64,
            TfScheme::Boolean => {
                if count > 0 {
                    1.0
                } else {
                    0.0
                }
            }
            TfScheme::LogAverage => {
                if count > 0 {
                    1.0 + (count as f64).ln()
                } else {
                    0.0
                }
            }
            TfScheme::Augmented => {
                if max_count > 0 {
                    0.5 + 0.5 * (count as f64 / max_count as f64)
                } else {
                    0.0
                }
            }
        }
    }
}

impl FromStr for TfScheme {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "n" => Ok(TfScheme::Natural),
            "b" => Ok(TfScheme::Boolean),
            "l" => Ok(TfScheme::LogAverage),
            "a" => Ok(TfScheme::Augmented),
            other => Err(format!("unknown tf scheme: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdfScheme {
    /// `n` — no idf factor.
    None,
    /// `t` — `ln(N/df)`.
    Standard,
}

impl IdfScheme {
    pub fn uses_idf(&self) -> bool {
        matches!(self, IdfScheme::Standard)
    }
}

impl FromStr for IdfScheme {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "n" => Ok(IdfScheme::None),
            "t" => Ok(IdfScheme::Standard),
            other => Err(format!("unknown idf scheme: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormScheme {
    /// `n` — no normalization beyond the cosine denominator already applied.
    None,
    /// `c` — cosine (handled by the shared cosine helper; kept as a marker).
    Cosine,
}

impl FromStr for NormScheme {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "n" => Ok(NormScheme::None),
            "c" => Ok(NormScheme::Cosine),
            other => Err(format!("unknown norm scheme: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmartTriple {
    pub tf: TfScheme,
    pub idf: IdfScheme,
    pub norm: NormScheme,
}

impl FromStr for SmartTriple {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 3 {
            return Err(format!("SMART triple must be exactly 3 letters, got {s:?}"));
        }
        Ok(SmartTriple {
            tf: chars[0].to_string().parse()?,
            idf: chars[1].to_string().parse()?,
            norm: chars[2].to_string().parse()?,
        })
    }
}

impl Default for SmartTriple {
    fn default() -> Self {
        SmartTriple { tf: TfScheme::LogAverage, idf: IdfScheme::Standard, norm: NormScheme::Cosine }
    }
}

/// A `ddd.qqq` SMART config: independent document- and query-side triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmartConfig {
    pub doc: SmartTriple,
    pub query: SmartTriple,
}

impl Default for SmartConfig {
    fn default() -> Self {
        SmartConfig { doc: SmartTriple::default(), query: SmartTriple::default() }
    }
}

impl FromStr for SmartConfig {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        let (doc_part, query_part) = s.split_once('.').ok_or_else(|| format!("expected ddd.qqq, got {s:?}"))?;
        Ok(SmartConfig { doc: doc_part.parse()?, query: query_part.parse()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ltc_dot_ltc() {
        let cfg: SmartConfig = "ltc.ltc".parse().unwrap();
        assert_eq!(cfg.doc.tf, TfScheme::LogAverage);
        assert_eq!(cfg.doc.idf, IdfScheme::Standard);
        assert_eq!(cfg.doc.norm, NormScheme::Cosine);
        assert_eq!(cfg.query.tf, TfScheme::LogAverage);
    }

    #[test]
    fn rejects_malformed_triple() {
        assert!("lt.ltc".parse::<SmartConfig>().is_err());
        assert!("xyz.ltc".parse::<SmartConfig>().is_err());
    }

    #[test]
    fn boolean_tf_is_zero_or_one() {
        assert_eq!(TfScheme::Boolean.weight(0, 5), 0.0);
        assert_eq!(TfScheme::Boolean.weight(5, 5), 1.0);
    }

    #[test]
    fn augmented_tf_scales_between_half_and_one() {
        assert_eq!(TfScheme::Augmented.weight(5, 5), 1.0);
        assert_eq!(TfScheme::Augmented.weight(0, 5), 0.5);
        assert!((TfScheme::Augmented.weight(2, 4) - 0.75).abs() < 1e-12);
        assert_eq!(TfScheme::Augmented.weight(0, 0), 0.0);
    }
}
