use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Raw counts for one arm of an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantStats {
    pub impressions: u64,
    pub conversions: u64,
}

impl VariantStats {
    pub fn conversion_rate(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.conversions as f64 / self.impressions as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantComparison {
    pub control_rate: f64,
    pub variant_rate: f64,
    /// Relative change of the variant over control; `None` when control never converted
    pub improvement: Option<f64>,
}

/// Compares a variant's conversion rate against control
pub fn compare_variants(control: VariantStats, variant: VariantStats) -> AppResult<VariantComparison> {
    for (arm, stats) in [("control", control), ("variant", variant)] {
        if stats.conversions > stats.impressions {
            return Err(AppError::Validation(format!(
                "{} has more conversions ({}) than impressions ({})",
                arm, stats.conversions, stats.impressions
            )));
        }
    }

    let control_rate = control.conversion_rate();
    let variant_rate = variant.conversion_rate();
    let improvement = if control_rate > 0.0 {
        Some((variant_rate - control_rate) / control_rate)
    } else {
        None
    };

    Ok(VariantComparison {
        control_rate,
        variant_rate,
        improvement,
    })
}
