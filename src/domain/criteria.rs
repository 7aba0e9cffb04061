// src/domain/criteria.rs

use serde::{Deserialize, Serialize};

/// Optional bounds applied to a collected batch. An unset bound is never
/// enforced; a zero minimum count is treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinementCriteria {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub min_bedrooms: Option<u32>,
    pub min_bathrooms: Option<u32>,
    pub min_parking: Option<u32>,
    #[serde(default)]
    pub requires_condo_fee: bool,
}

impl RefinementCriteria {
    pub fn is_unrestricted(&self) -> bool {
        self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_area.is_none()
            && self.max_area.is_none()
            && self.min_bedrooms.unwrap_or(0) == 0
            && self.min_bathrooms.unwrap_or(0) == 0
            && self.min_parking.unwrap_or(0) == 0
            && !self.requires_condo_fee
    }

    /// One-line description of the active bounds, for logs and user replies.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if let Some(max) = self.max_area {
            parts.push(format!("up to {}m²", format_plain(max)));
        }
        if let Some(min) = self.min_area {
            parts.push(format!("min {}m²", format_plain(min)));
        }
        if let Some(max) = self.max_price {
            parts.push(format!("up to R$ {}", format_brl(max)));
        }
        if let Some(min) = self.min_price {
            parts.push(format!("min R$ {}", format_brl(min)));
        }
        for (min, noun) in [
            (self.min_bedrooms, "bedrooms"),
            (self.min_bathrooms, "bathrooms"),
            (self.min_parking, "parking spaces"),
        ] {
            if let Some(n) = min.filter(|n| *n > 0) {
                parts.push(format!("{n}+ {noun}"));
            }
        }
        if self.requires_condo_fee {
            parts.push("condo fee listed".to_string());
        }

        if parts.is_empty() {
            "no refinements".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn format_plain(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Whole reais with `.` as thousands separator, e.g. `250.000`.
fn format_brl(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    if whole < 0 {
        out.insert(0, '-');
    }
    out
}
