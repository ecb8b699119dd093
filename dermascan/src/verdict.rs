use serde::{Deserialize, Serialize};

pub const CANCER_SUGGESTION: &str = "Segera periksa ke dokter!";
pub const NON_CANCER_SUGGESTION: &str = "Penyakit kanker tidak terdeteksi.";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Diagnosis {
    #[serde(rename = "Cancer")]
    Cancer,
    #[serde(rename = "Non-cancer")]
    NonCancer,
}

impl Diagnosis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Diagnosis::Cancer => "Cancer",
            Diagnosis::NonCancer => "Non-cancer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub result: Diagnosis,
    pub suggestion: &'static str,
}

impl Verdict {
    /// Scores strictly above `threshold` are positive. NaN is never positive.
    pub fn from_score(score: f32, threshold: f32) -> Self {
        if score > threshold {
            Verdict {
                result: Diagnosis::Cancer,
                suggestion: CANCER_SUGGESTION,
            }
        } else {
            Verdict {
                result: Diagnosis::NonCancer,
                suggestion: NON_CANCER_SUGGESTION,
            }
        }
    }
}
