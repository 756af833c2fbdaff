//! Splits CSV or Markdown tables into raw import candidates.
//!
//! Columns are located by header name, so their order in the input does not
//! matter. Input is split into lines before cells are read, so quotes never
//! span rows. Rows made only of blanks and dashes (Markdown separators,
//! spacer lines) are dropped before indexing.

use crate::core::error::ImportFormatError;
use crate::core::transaction::ImportCandidate;
use anyhow::anyhow;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Markdown,
}

impl TabularFormat {
    pub fn delimiter(self) -> u8 {
        match self {
            TabularFormat::Csv => b',',
            TabularFormat::Markdown => b'|',
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(TabularFormat::Csv),
            "md" | "markdown" => Some(TabularFormat::Markdown),
            _ => None,
        }
    }
}

impl FromStr for TabularFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(TabularFormat::Csv),
            "md" | "markdown" => Ok(TabularFormat::Markdown),
            other => Err(anyhow!("Unsupported table format: {other}")),
        }
    }
}

/// Canonical columns, in the order missing ones are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Amount,
    Date,
    Category,
    AssetType,
    Currency,
}

impl Field {
    const ALL: [Field; 6] = [
        Field::Name,
        Field::Amount,
        Field::Date,
        Field::Category,
        Field::AssetType,
        Field::Currency,
    ];

    /// Normalized header text this field matches.
    fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Amount => "amount",
            Field::Date => "date",
            Field::Category => "category",
            Field::AssetType => "assettype",
            Field::Currency => "currency",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Field::AssetType => "assetType",
            other => other.key(),
        }
    }

    fn required(self) -> bool {
        self != Field::Category
    }
}

/// Column index for each canonical field, by `Field::ALL` position.
#[derive(Debug, Default)]
struct ColumnMap([Option<usize>; 6]);

impl ColumnMap {
    fn get(&self, field: Field) -> Option<usize> {
        self.0[field as usize]
    }
}

fn normalize_header(cell: &str) -> String {
    cell.trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn resolve_header(header: &StringRecord) -> Result<ColumnMap, ImportFormatError> {
    let mut columns = ColumnMap::default();
    for (index, cell) in header.iter().enumerate() {
        let key = normalize_header(cell);
        if let Some(field) = Field::ALL.iter().find(|f| f.key() == key) {
            // First match wins for duplicated columns.
            columns.0[*field as usize].get_or_insert(index);
        }
    }

    let missing_fields: Vec<&'static str> = Field::ALL
        .iter()
        .filter(|f| f.required() && columns.get(**f).is_none())
        .map(|f| f.label())
        .collect();
    if !missing_fields.is_empty() {
        return Err(ImportFormatError { missing_fields });
    }
    Ok(columns)
}

/// True when every cell is blank or made only of dashes.
pub fn is_empty_row<S: AsRef<str>>(cells: &[S]) -> bool {
    cells.iter().all(|cell| {
        let cell = cell.as_ref().trim();
        cell.is_empty() || cell.chars().all(|c| c == '-')
    })
}

fn cell(record: &StringRecord, index: Option<usize>) -> Option<String> {
    let value = record.get(index?)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Splits one line into cells; `None` for a blank or unreadable line.
fn split_row(line: &str, format: TabularFormat) -> Option<StringRecord> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(format.delimiter())
        .quoting(format == TabularFormat::Csv)
        .from_reader(line.as_bytes());

    match reader.records().next()? {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, "Skipping unreadable row");
            None
        }
    }
}

/// Parses `text` into candidates, one per non-empty data row, in input order.
pub fn parse(text: &str, format: TabularFormat) -> Result<Vec<ImportCandidate>, ImportFormatError> {
    let mut lines = text.lines().skip_while(|line| line.trim().is_empty());

    let header = lines
        .next()
        .and_then(|line| split_row(line, format))
        .unwrap_or_default();
    let columns = resolve_header(&header)?;

    // The line right after a Markdown header is its separator.
    if format == TabularFormat::Markdown {
        lines.next();
    }

    let candidates: Vec<ImportCandidate> = lines
        .filter_map(|line| split_row(line, format))
        .filter(|record| !is_empty_row(&record.iter().collect::<Vec<_>>()))
        .map(|record| ImportCandidate {
            name: cell(&record, columns.get(Field::Name)),
            amount: cell(&record, columns.get(Field::Amount)),
            date: cell(&record, columns.get(Field::Date)),
            category: cell(&record, columns.get(Field::Category)),
            asset_type: cell(&record, columns.get(Field::AssetType)),
            currency: cell(&record, columns.get(Field::Currency)),
        })
        .collect();

    debug!(rows = candidates.len(), ?format, "Parsed table");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_ROWS: &str = "\
name,amount,date,category,assetType,currency
Salary,2500,2024-01-31,income,cash,usd
Rent,-1200,2024-02-01,housing,cash,usd
Apple,3,2024-02-03,investing,stock,AAPL
Bitcoin,0.05,2024-02-04,investing,crypto,BTC
Groceries,\"-1,234.50\",2024-02-05,food,cash,eur
";

    #[test]
    fn test_parses_well_formed_csv() {
        let candidates = parse(FIVE_ROWS, TabularFormat::Csv).unwrap();
        assert_eq!(candidates.len(), 5);
        assert_eq!(candidates[0].name.as_deref(), Some("Salary"));
        assert_eq!(candidates[3].asset_type.as_deref(), Some("crypto"));
        // Quoted thousands separator stays in one cell.
        assert_eq!(candidates[4].amount.as_deref(), Some("-1,234.50"));
        assert_eq!(candidates[4].currency.as_deref(), Some("eur"));
    }

    #[test]
    fn test_missing_columns_reported_in_canonical_order() {
        let text = "currency,name,date,assetType\nusd,Coffee,2024-01-01,cash\n";
        let err = parse(text, TabularFormat::Csv).unwrap_err();
        assert_eq!(err.missing_fields, vec!["amount"]);

        let text = "date,name,assettype\n2024-01-01,Coffee,cash\n";
        let err = parse(text, TabularFormat::Csv).unwrap_err();
        assert_eq!(err.missing_fields, vec!["amount", "currency"]);

        let err = parse("", TabularFormat::Csv).unwrap_err();
        assert_eq!(
            err.missing_fields,
            vec!["name", "amount", "date", "assetType", "currency"]
        );
    }

    #[test]
    fn test_header_order_and_spelling_do_not_matter() {
        let text = "\
Currency , Asset Type,AMOUNT,Date,Name
usd,cash,-4.5,2024-03-01,Coffee
";
        let candidates = parse(text, TabularFormat::Csv).unwrap();
        assert_eq!(candidates.len(), 1);
        let coffee = &candidates[0];
        assert_eq!(coffee.name.as_deref(), Some("Coffee"));
        assert_eq!(coffee.amount.as_deref(), Some("-4.5"));
        assert_eq!(coffee.asset_type.as_deref(), Some("cash"));
        assert_eq!(coffee.currency.as_deref(), Some("usd"));
        assert!(coffee.category.is_none());
    }

    #[test]
    fn test_duplicate_columns_use_first_match() {
        let text = "name,amount,amount,date,assetType,currency\nA,1,2,2024-01-01,cash,usd\n";
        let candidates = parse(text, TabularFormat::Csv).unwrap();
        assert_eq!(candidates[0].amount.as_deref(), Some("1"));
    }

    #[test]
    fn test_empty_rows_are_dropped_before_indexing() {
        let text = "\
name,amount,date,category,assetType,currency
,,,,,
First,1,2024-01-01,,cash,usd
---,--,,,-,
Second,2,2024-01-02,,cash,usd
";
        let candidates = parse(text, TabularFormat::Csv).unwrap();
        let names: Vec<_> = candidates.iter().map(|c| c.name.as_deref()).collect();
        assert_eq!(names, vec![Some("First"), Some("Second")]);
        assert!(candidates[0].category.is_none());
    }

    #[test]
    fn test_markdown_table_with_bounding_pipes() {
        let text = "\
| Name   | Amount | Date       | Category | Asset Type | Currency |
|--------|--------|------------|----------|------------|----------|
| Salary | 2500   | 2024-01-31 | income   | cash       | usd      |
|        |        |            |          |            |          |
| Tesla  | \"2\"  | 2024-02-01 |          | stock      | TSLA     |
";
        let candidates = parse(text, TabularFormat::Markdown).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name.as_deref(), Some("Salary"));
        assert_eq!(candidates[0].category.as_deref(), Some("income"));
        // Quoting is off for Markdown.
        assert_eq!(candidates[1].amount.as_deref(), Some("\"2\""));
        assert!(candidates[1].category.is_none());
    }

    #[test]
    fn test_markdown_skips_row_after_header_unconditionally() {
        let text = "\
| name | amount | date | assetType | currency |
| Lost | 1 | 2024-01-01 | cash | usd |
| Kept | 2 | 2024-01-02 | cash | usd |
";
        let candidates = parse(text, TabularFormat::Markdown).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name.as_deref(), Some("Kept"));
    }

    #[test]
    fn test_markdown_separator_slot_may_be_blank() {
        let text = "\
| name | amount | date | assetType | currency |

| Kept | 2 | 2024-01-02 | cash | usd |
";
        let candidates = parse(text, TabularFormat::Markdown).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name.as_deref(), Some("Kept"));
    }

    #[test]
    fn test_stray_quote_stays_on_its_own_row() {
        let text = "\
name,amount,date,assetType,currency
\"Bad,1,2024-01-01,cash,usd
Good,2,2024-01-02,cash,usd
Also,3,2024-01-03,cash,usd
";
        let candidates = parse(text, TabularFormat::Csv).unwrap();
        assert_eq!(candidates.len(), 3);
        assert!(candidates[0].amount.is_none());
        assert_eq!(candidates[1].name.as_deref(), Some("Good"));
        assert_eq!(candidates[1].amount.as_deref(), Some("2"));
        assert_eq!(candidates[2].name.as_deref(), Some("Also"));
    }

    #[test]
    fn test_header_columns_resolve_in_any_order() {
        let columns = resolve_header(&StringRecord::from(vec![
            "currency", "name", "date", "amount", "assetType", "category",
        ]))
        .unwrap();
        assert_eq!(columns.get(Field::Currency), Some(0));
        assert_eq!(columns.get(Field::Name), Some(1));
        assert_eq!(columns.get(Field::Date), Some(2));
        assert_eq!(columns.get(Field::Amount), Some(3));
        assert_eq!(columns.get(Field::AssetType), Some(4));
        assert_eq!(columns.get(Field::Category), Some(5));

        let columns = resolve_header(&StringRecord::from(vec![
            "name", "date", "amount", "category", "currency", "assetType",
        ]))
        .unwrap();
        assert_eq!(columns.get(Field::Name), Some(0));
        assert_eq!(columns.get(Field::Date), Some(1));
        assert_eq!(columns.get(Field::Amount), Some(2));
        assert_eq!(columns.get(Field::Category), Some(3));
        assert_eq!(columns.get(Field::Currency), Some(4));
        assert_eq!(columns.get(Field::AssetType), Some(5));
    }

    #[test]
    fn test_is_empty_row() {
        assert!(is_empty_row(&["-", "-", "-", "-", "-"]));
        assert!(!is_empty_row(&["name", "amount", "date", "category", "type"]));
        assert!(is_empty_row(&["", "  ", "---", "-"]));
        assert!(is_empty_row::<&str>(&[]));
        assert!(!is_empty_row(&["", "x"]));
        assert!(!is_empty_row(&["-5"]));
        assert!(!is_empty_row(&["--a"]));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!("CSV".parse::<TabularFormat>().unwrap(), TabularFormat::Csv);
        assert_eq!("md".parse::<TabularFormat>().unwrap(), TabularFormat::Markdown);
        assert!("xlsx".parse::<TabularFormat>().is_err());
        assert_eq!(
            TabularFormat::from_path(Path::new("export.Markdown")),
            Some(TabularFormat::Markdown)
        );
        assert_eq!(TabularFormat::from_path(Path::new("data")), None);
    }
}
