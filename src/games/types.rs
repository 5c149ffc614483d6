use crate::common::{Amount, Multiplier};
use crate::errors::CatalogError;
use crate::games::paytable::{REELS, ROWS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Visible symbol window, `ROWS` rows of `REELS` symbols
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<String>>", into = "Vec<Vec<String>>")]
pub struct Grid(Vec<Vec<String>>);

impl Grid {
    /// Build a grid, checking its shape
    pub fn new(rows: Vec<Vec<String>>) -> Result<Self, CatalogError> {
        if rows.len() != ROWS {
            return Err(CatalogError::GridShape(format!("{} rows, expected {}", rows.len(), ROWS)));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != REELS) {
            return Err(CatalogError::GridShape(format!(
                "row with {} reels, expected {}",
                row.len(),
                REELS
            )));
        }
        Ok(Self(rows))
    }

    pub fn from_names(rows: [[&str; REELS]; ROWS]) -> Self {
        Self(
            rows.iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    pub fn symbol(&self, row: usize, reel: usize) -> &str {
        &self.0[row][reel]
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.0
    }

    /// Occurrences of `symbol` anywhere on the grid
    pub fn count(&self, symbol: &str) -> usize {
        self.0.iter().flatten().filter(|s| s.as_str() == symbol).count()
    }
}

impl TryFrom<Vec<Vec<String>>> for Grid {
    type Error = CatalogError;

    fn try_from(rows: Vec<Vec<String>>) -> Result<Self, Self::Error> {
        Grid::new(rows)
    }
}

impl From<Grid> for Vec<Vec<String>> {
    fn from(grid: Grid) -> Self {
        grid.0
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self.0.iter().map(|row| row.join(" ")).collect();
        write!(f, "{}", rows.join(" | "))
    }
}

/// Which rule produced a win
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContributionKind {
    Line {
        /// 1-based payline number in catalog order
        payline: usize,
        payline_name: String,
        symbol: String,
        run: u8,
    },
    Scatter {
        count: usize,
        threshold: u8,
    },
}

/// One paying line or scatter rule in an outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    #[serde(flatten)]
    pub kind: ContributionKind,
    pub multiplier: Multiplier,
    pub amount: Amount,
    pub description: String,
}

/// Result of evaluating one grid. Not persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub grid: Grid,
    pub payout: Amount,
    pub contributions: Vec<Contribution>,
    pub scatter_count: usize,
}

impl Outcome {
    pub fn is_win(&self) -> bool {
        !self.payout.is_zero()
    }
}

/// VRF bundle containing cryptographic proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VRFBundle {
    /// Hex-encoded 32-byte seed derived from the VRF output, seeds the reel draw
    pub vrf_output: String,
    /// Hex-encoded VRF pre-output (32 bytes)
    pub vrf_preout: String,
    /// Hex-encoded schnorrkel VRF proof (64 bytes)
    pub vrf_proof: String,
    /// Hex-encoded public key (32 bytes)
    pub public_key: String,
    /// Input message used for VRF
    pub input_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_shape_checked() {
        let ok = vec![vec!["A".to_string(); REELS]; ROWS];
        assert!(Grid::new(ok).is_ok());

        let short = vec![vec!["A".to_string(); REELS - 1]; ROWS];
        assert!(matches!(Grid::new(short), Err(CatalogError::GridShape(_))));

        let tall = vec![vec!["A".to_string(); REELS]; ROWS + 1];
        assert!(Grid::new(tall).is_err());
    }

    #[test]
    fn test_misshapen_grid_rejected_on_deserialize() {
        let grid = Grid::from_names([
            ["9", "10", "9", "10", "9"],
            ["A", "A", "A", "K", "Q"],
            ["J", "Q", "J", "Q", "J"],
        ]);
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json[1][0], "A");
        assert_eq!(serde_json::from_value::<Grid>(json).unwrap(), grid);

        let short = serde_json::json!([["A", "A"], ["K", "K"], ["Q", "Q"]]);
        let err = serde_json::from_value::<Grid>(short).unwrap_err();
        assert!(err.to_string().contains("reels"));

        assert!(serde_json::from_value::<Grid>(serde_json::json!([])).is_err());
    }

    #[test]
    fn test_grid_count_and_display() {
        let grid = Grid::from_names([
            ["S", "9", "9", "9", "S"],
            ["A", "A", "A", "K", "Q"],
            ["J", "S", "J", "Q", "J"],
        ]);
        assert_eq!(grid.count("S"), 3);
        assert_eq!(grid.symbol(1, 3), "K");
        assert_eq!(grid.to_string(), "S 9 9 9 S | A A A K Q | J S J Q J");
    }

    #[test]
    fn test_contribution_serialization_is_tagged() {
        let contribution = Contribution {
            kind: ContributionKind::Scatter { count: 3, threshold: 3 },
            multiplier: Multiplier::from_hundredths(200),
            amount: Amount::from_major_units(20),
            description: "Scatter S x3 pays 20.00".to_string(),
        };
        let json = serde_json::to_value(&contribution).unwrap();
        assert_eq!(json["kind"], "scatter");
        assert_eq!(json["multiplier"], 2.0);
        assert_eq!(json["amount"], 20_000_000);

        let back: Contribution = serde_json::from_value(json).unwrap();
        assert_eq!(back, contribution);
    }
}
