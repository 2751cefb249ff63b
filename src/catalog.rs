//! Product catalog: bulk-loaded once from the store's spreadsheet (an
//! `.xlsx` workbook or a CSV export), then shared read-only by every handler.
use crate::model::{Product, ProductId};
use calamine::{open_workbook_auto, Reader};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("workbook has no worksheet")]
    NoWorksheet,
    #[error("catalog file has no `{0}` column")]
    MissingColumn(&'static str),
}

/// Accepted header spellings for each canonical attribute.
const ID_COLUMNS: &[&str] = &["id", "product_id"];
const TITLE_COLUMNS: &[&str] = &["title", "product_name", "name"];
const PRICE_COLUMNS: &[&str] = &["price"];
const IMAGE_COLUMNS: &[&str] = &["image_url", "image"];
const URL_COLUMNS: &[&str] = &["url", "product_url"];
const INVENTORY_COLUMNS: &[&str] = &["inventory", "stock"];

/// Extensions read through calamine; everything else is parsed as CSV.
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the catalog at `path`. A missing file yields an empty catalog.
    /// Workbooks are read from their first worksheet.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            info!(path = %path.display(), "catalog file not found; starting with an empty catalog");
            return Ok(Self::empty());
        }
        let catalog = if is_workbook(path) {
            Self::from_workbook(path)?
        } else {
            let reader = csv_builder().from_path(path)?;
            Self::from_csv_reader(reader)?
        };
        info!(path = %path.display(), products = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Like `load`, but an unusable file is logged and replaced by an empty
    /// catalog so the bot stays reachable.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) => catalog,
            Err(err) => {
                error!(?err, path = %path.display(), "failed to load catalog; serving an empty one");
                Self::empty()
            }
        }
    }

    /// Parse CSV content already in memory.
    pub fn from_csv_str(content: &str) -> Result<Self, CatalogError> {
        Self::from_csv_reader(csv_builder().from_reader(content.as_bytes()))
    }

    fn from_csv_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, CatalogError> {
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        // Header is line 1.
        let rows = reader.records().enumerate().filter_map(|(idx, record)| match record {
            Ok(row) => Some((idx + 2, row.iter().map(str::to_string).collect::<Vec<String>>())),
            Err(err) => {
                warn!(line = idx + 2, ?err, "skipping unreadable catalog row");
                None
            }
        });
        Self::from_rows(&headers, rows)
    }

    fn from_workbook(path: &Path) -> Result<Self, CatalogError> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(CatalogError::NoWorksheet)??;
        let mut rows = range
            .rows()
            .map(|cells| cells.iter().map(|c| c.to_string()).collect::<Vec<String>>());
        let headers = rows.next().unwrap_or_default();
        Self::from_rows(&headers, rows.enumerate().map(|(idx, row)| (idx + 2, row)))
    }

    /// Shared row policy: resolve columns, skip malformed rows, keep the first
    /// row for a duplicated id.
    fn from_rows(
        headers: &[String],
        rows: impl Iterator<Item = (usize, Vec<String>)>,
    ) -> Result<Self, CatalogError> {
        let columns = Columns::resolve(headers)?;

        let mut products = Vec::new();
        let mut seen: HashSet<ProductId> = HashSet::new();
        for (line, row) in rows {
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            match columns.parse_row(&row) {
                Ok(product) => {
                    if !seen.insert(product.id) {
                        warn!(line, id = product.id, "skipping duplicate product id");
                        continue;
                    }
                    products.push(product);
                }
                Err(reason) => warn!(line, reason, "skipping malformed catalog row"),
            }
        }
        Ok(Self { products })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Case-insensitive substring match on titles, in catalog order.
    /// A blank query matches nothing.
    pub fn search(&self, query: &str) -> Vec<&Product> {
        let needle = fold_case(query.trim());
        if needle.is_empty() {
            return Vec::new();
        }
        self.products
            .iter()
            .filter(|p| fold_case(&p.title).contains(&needle))
            .collect()
    }
}

fn csv_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true).trim(csv::Trim::All);
    builder
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.iter().any(|w| e.eq_ignore_ascii_case(w)))
        .unwrap_or(false)
}

/// Per-character lowercase, so a letter folds the same wherever it sits in
/// the word. Final sigma folds to σ.
fn fold_case(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ς' { 'σ' } else { c })
        .collect()
}

/// Column positions resolved from the header row.
struct Columns {
    id: usize,
    title: usize,
    price: usize,
    image_url: Option<usize>,
    url: Option<usize>,
    inventory: Option<usize>,
}

impl Columns {
    fn resolve(headers: &[String]) -> Result<Self, CatalogError> {
        let find = |names: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim().trim_start_matches('\u{feff}');
                names.iter().any(|n| h.eq_ignore_ascii_case(n))
            })
        };
        Ok(Self {
            id: find(ID_COLUMNS).ok_or(CatalogError::MissingColumn("id"))?,
            title: find(TITLE_COLUMNS).ok_or(CatalogError::MissingColumn("title"))?,
            price: find(PRICE_COLUMNS).ok_or(CatalogError::MissingColumn("price"))?,
            image_url: find(IMAGE_COLUMNS),
            url: find(URL_COLUMNS),
            inventory: find(INVENTORY_COLUMNS),
        })
    }

    fn parse_row(&self, row: &[String]) -> Result<Product, &'static str> {
        let field = |idx: usize| row.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty());
        let optional = |idx: Option<usize>| idx.and_then(field).map(str::to_string);

        let id = field(self.id)
            .and_then(parse_integer)
            .ok_or("missing or invalid id")?;
        let title = field(self.title).ok_or("missing title")?.to_string();
        let price = field(self.price)
            .and_then(parse_integer)
            .ok_or("missing or invalid price")?;
        let inventory = self
            .inventory
            .and_then(field)
            .and_then(|s| s.replace(',', "").parse::<f64>().ok());

        Ok(Product {
            id,
            title,
            price,
            image_url: optional(self.image_url),
            url: optional(self.url),
            inventory,
        })
    }
}

/// Parse an integer cell, tolerating thousands separators and a zero
/// fractional part as spreadsheets tend to export (`25,000,000`, `42.0`).
fn parse_integer(raw: &str) -> Option<i64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '_').collect();
    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }
    let v = cleaned.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}
