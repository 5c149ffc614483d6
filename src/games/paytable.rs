//! Paytable catalog
//!
//! Symbol weights, line and scatter pays, payline geometry. A `Paytable` is
//! validated once when it is built and is immutable afterwards; the engine
//! never has to defend against a malformed catalog at spin time.

use crate::common::Multiplier;
use crate::errors::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Rows on the visible grid
pub const ROWS: usize = 3;
/// Reels (columns) on the visible grid
pub const REELS: usize = 5;

/// Game id of the built-in catalog
pub const CLASSIC_GAME_ID: &str = "classic-5x3";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    #[default]
    Standard,
    Wild,
    Scatter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymbolSpec {
    pub name: String,
    /// Relative draw weight, must be > 0
    pub weight: u32,
    #[serde(default)]
    pub kind: SymbolKind,
}

/// Multiplier on the per-line bet for `count` consecutive `symbol`s from reel 1
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinePay {
    pub symbol: String,
    pub count: u8,
    pub multiplier: Multiplier,
}

/// Multiplier on the total wager for at least `count` scatters anywhere
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScatterPay {
    pub count: u8,
    pub multiplier: Multiplier,
}

/// A payline: the row index read on each reel, left to right
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payline {
    pub name: String,
    pub rows: Vec<usize>,
}

impl Payline {
    pub fn new(name: &str, rows: [usize; REELS]) -> Self {
        Self {
            name: name.to_string(),
            rows: rows.to_vec(),
        }
    }

    /// (row, reel) coordinates in reel order
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows.iter().enumerate().map(|(reel, &row)| (row, reel))
    }
}

/// Serializable catalog definition, as written in a paytable TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaytableSpec {
    pub game_id: String,
    pub symbols: Vec<SymbolSpec>,
    pub line_pays: Vec<LinePay>,
    pub scatter_pays: Vec<ScatterPay>,
    pub paylines: Vec<Payline>,
}

impl PaytableSpec {
    /// Built-in 5x3 game: six card symbols, a wild and a scatter, five lines
    pub fn classic() -> Self {
        let symbol = |name: &str, weight: u32, kind: SymbolKind| SymbolSpec {
            name: name.to_string(),
            weight,
            kind,
        };

        let symbols = vec![
            symbol("9", 30, SymbolKind::Standard),
            symbol("10", 28, SymbolKind::Standard),
            symbol("J", 24, SymbolKind::Standard),
            symbol("Q", 20, SymbolKind::Standard),
            symbol("K", 16, SymbolKind::Standard),
            symbol("A", 12, SymbolKind::Standard),
            symbol("W", 4, SymbolKind::Wild),
            symbol("S", 6, SymbolKind::Scatter),
        ];

        // (symbol, [x3, x4, x5]) in hundredths of the per-line bet
        let line_table: [(&str, [u32; 3]); 7] = [
            ("9", [100, 200, 500]),
            ("10", [150, 300, 750]),
            ("J", [200, 400, 1_000]),
            ("Q", [250, 500, 1_250]),
            ("K", [400, 800, 2_000]),
            ("A", [500, 1_000, 2_500]),
            ("W", [1_000, 2_500, 10_000]),
        ];
        let line_pays = line_table
            .iter()
            .flat_map(|(name, pays)| {
                pays.iter().enumerate().map(move |(i, &hundredths)| LinePay {
                    symbol: name.to_string(),
                    count: 3 + i as u8,
                    multiplier: Multiplier::from_hundredths(hundredths),
                })
            })
            .collect();

        let scatter_pays = [(3, 200), (4, 500), (5, 2_000)]
            .iter()
            .map(|&(count, hundredths)| ScatterPay {
                count,
                multiplier: Multiplier::from_hundredths(hundredths),
            })
            .collect();

        let paylines = vec![
            Payline::new("top", [0, 0, 0, 0, 0]),
            Payline::new("middle", [1, 1, 1, 1, 1]),
            Payline::new("bottom", [2, 2, 2, 2, 2]),
            Payline::new("v", [0, 1, 2, 1, 0]),
            Payline::new("inverted-v", [2, 1, 0, 1, 2]),
        ];

        Self {
            game_id: CLASSIC_GAME_ID.to_string(),
            symbols,
            line_pays,
            scatter_pays,
            paylines,
        }
    }
}

/// Validated, immutable paytable catalog
#[derive(Debug, Clone)]
pub struct Paytable {
    game_id: String,
    symbols: Vec<SymbolSpec>,
    line_pays: HashMap<String, BTreeMap<u8, Multiplier>>,
    scatter_symbol: String,
    wild_symbol: Option<String>,
    scatter_pays: BTreeMap<u8, Multiplier>,
    paylines: Vec<Payline>,
}

impl Paytable {
    /// The built-in catalog. Covered by `test_classic_catalog_is_valid`.
    pub fn classic() -> Self {
        Self::from_spec(PaytableSpec::classic()).expect("built-in paytable must validate")
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let spec: PaytableSpec =
            toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_spec(spec)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Parse(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Validate a catalog definition
    pub fn from_spec(spec: PaytableSpec) -> Result<Self, CatalogError> {
        if spec.symbols.is_empty() {
            return Err(CatalogError::EmptyAlphabet);
        }

        let mut names = HashSet::new();
        for symbol in &spec.symbols {
            if !names.insert(symbol.name.as_str()) {
                return Err(CatalogError::DuplicateSymbol(symbol.name.clone()));
            }
            if symbol.weight == 0 {
                return Err(CatalogError::NonPositiveWeight(symbol.name.clone()));
            }
        }

        let scatters: Vec<&SymbolSpec> = spec
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Scatter)
            .collect();
        if scatters.len() != 1 {
            return Err(CatalogError::ScatterCount(scatters.len()));
        }
        let scatter_symbol = scatters[0].name.clone();

        let wilds: Vec<&SymbolSpec> = spec
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Wild)
            .collect();
        if wilds.len() > 1 {
            return Err(CatalogError::WildCount(wilds.len()));
        }
        let wild_symbol = wilds.first().map(|s| s.name.clone());

        let mut line_pays: HashMap<String, BTreeMap<u8, Multiplier>> = HashMap::new();
        for pay in &spec.line_pays {
            if !names.contains(pay.symbol.as_str()) {
                return Err(CatalogError::UndefinedSymbol(pay.symbol.clone()));
            }
            if pay.symbol == scatter_symbol {
                return Err(CatalogError::ScatterInLinePays(pay.symbol.clone()));
            }
            if pay.count == 0 || pay.count as usize > REELS {
                return Err(CatalogError::InvalidRunLength {
                    symbol: pay.symbol.clone(),
                    count: pay.count,
                    max: REELS,
                });
            }
            let label = format!("{} x{}", pay.symbol, pay.count);
            if pay.multiplier.hundredths() == 0 {
                return Err(CatalogError::ZeroMultiplier(label));
            }
            let table = line_pays.entry(pay.symbol.clone()).or_default();
            if table.insert(pay.count, pay.multiplier).is_some() {
                return Err(CatalogError::DuplicatePay(label));
            }
        }

        if spec.scatter_pays.is_empty() {
            return Err(CatalogError::EmptyScatterPays);
        }
        let mut scatter_pays = BTreeMap::new();
        for pay in &spec.scatter_pays {
            if pay.count == 0 || pay.count as usize > ROWS * REELS {
                return Err(CatalogError::InvalidRunLength {
                    symbol: scatter_symbol.clone(),
                    count: pay.count,
                    max: ROWS * REELS,
                });
            }
            let label = format!("{} x{}", scatter_symbol, pay.count);
            if pay.multiplier.hundredths() == 0 {
                return Err(CatalogError::ZeroMultiplier(label));
            }
            if scatter_pays.insert(pay.count, pay.multiplier).is_some() {
                return Err(CatalogError::DuplicatePay(label));
            }
        }

        if spec.paylines.is_empty() {
            return Err(CatalogError::NoPaylines);
        }
        for line in &spec.paylines {
            if line.rows.len() != REELS {
                return Err(CatalogError::PaylineLength {
                    name: line.name.clone(),
                    len: line.rows.len(),
                    expected: REELS,
                });
            }
            if let Some(&row) = line.rows.iter().find(|&&row| row >= ROWS) {
                return Err(CatalogError::PaylineOutOfBounds {
                    name: line.name.clone(),
                    row,
                    rows: ROWS,
                });
            }
        }

        Ok(Self {
            game_id: spec.game_id,
            symbols: spec.symbols,
            line_pays,
            scatter_symbol,
            wild_symbol,
            scatter_pays,
            paylines: spec.paylines,
        })
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn symbols(&self) -> &[SymbolSpec] {
        &self.symbols
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        self.symbols.iter().any(|s| s.name == name)
    }

    pub fn scatter_symbol(&self) -> &str {
        &self.scatter_symbol
    }

    pub fn wild_symbol(&self) -> Option<&str> {
        self.wild_symbol.as_deref()
    }

    pub fn paylines(&self) -> &[Payline] {
        &self.paylines
    }

    /// Multiplier for an exact run length. Only tabulated counts pay.
    pub fn line_multiplier(&self, symbol: &str, run: u8) -> Option<Multiplier> {
        self.line_pays.get(symbol)?.get(&run).copied()
    }

    pub fn has_line_pays(&self, symbol: &str) -> bool {
        self.line_pays.contains_key(symbol)
    }

    /// Highest threshold not above `count`, with its multiplier
    pub fn scatter_multiplier(&self, count: usize) -> Option<(u8, Multiplier)> {
        let count = u8::try_from(count).unwrap_or(u8::MAX);
        self.scatter_pays
            .range(..=count)
            .next_back()
            .map(|(&threshold, &multiplier)| (threshold, multiplier))
    }
}
