use crate::parser::normalize_text;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TITLED: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[title]").unwrap());

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCell {
    /// Visible text, whitespace collapsed.
    pub text: String,
    /// `title` of the cell or of the first titled element inside it.
    pub title: Option<String>,
    /// `data-th` / `aria-label` of the cell (responsive tables repeat the header here).
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
    /// Every `title` attribute found in the row, document order.
    pub titles: Vec<String>,
}

impl RawRow {
    pub fn cell(&self, index: usize) -> Option<&RawCell> {
        self.cells.get(index)
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(|c| c.text.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Normalized header texts (see [`normalize_text`]).
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Pick the first table whose header row satisfies every keyword group
/// (each group is a list of alternatives; one of them must appear in the
/// joined, normalized header text). Falls back to the first table in the
/// document. `None` only when the document has no table at all.
pub fn locate_table(html: &str, required: &[&[&str]]) -> Option<RawTable> {
    let document = Html::parse_document(html);
    let tables: Vec<ElementRef> = document.select(&TABLE).collect();

    let chosen = tables
        .iter()
        .find(|table| {
            let line = header_cells(table).join("|");
            required
                .iter()
                .all(|group| group.iter().any(|keyword| line.contains(keyword)))
        })
        .or_else(|| tables.first())?;

    Some(read_table(chosen))
}

/// Label/value pairs read pairwise from every row: `(cell0, cell1)`,
/// `(cell2, cell3)`, ... Labels come back raw; callers normalize.
pub fn key_value_pairs(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let mut pairs = Vec::new();

    for table in document.select(&TABLE) {
        for row in own_rows(&table) {
            let cells: Vec<String> = own_cells(&row, true).iter().map(clean_text).collect();
            for chunk in cells.chunks(2) {
                if let [label, value] = chunk {
                    if !label.is_empty() {
                        pairs.push((label.clone(), value.clone()));
                    }
                }
            }
        }
    }

    pairs
}

/// `tr` elements of this table only, looking through `thead`/`tbody`/`tfoot`
/// but never into a nested table.
fn own_rows<'a>(table: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn own_cells<'a>(row: &ElementRef<'a>, with_th: bool) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| match e.value().name() {
            "td" => true,
            "th" => with_th,
            _ => false,
        })
        .collect()
}

fn header_cells(table: &ElementRef) -> Vec<String> {
    own_rows(table)
        .first()
        .map(|row| {
            own_cells(row, true)
                .iter()
                .map(|c| normalize_text(&clean_text(c)))
                .collect()
        })
        .unwrap_or_default()
}

fn read_table(table: &ElementRef) -> RawTable {
    let headers = header_cells(table);
    let rows = own_rows(table)
        .iter()
        .skip(1)
        .map(read_row)
        .filter(|row| !row.cells.is_empty())
        .collect();

    RawTable { headers, rows }
}

fn read_row(row: &ElementRef) -> RawRow {
    let cells = own_cells(row, false)
        .into_iter()
        .map(|cell| {
            let el = cell.value();
            let title = el
                .attr("title")
                .map(str::to_string)
                .or_else(|| {
                    cell.select(&TITLED)
                        .next()
                        .and_then(|t| t.value().attr("title"))
                        .map(str::to_string)
                })
                .filter(|t| !t.trim().is_empty());
            let label = el
                .attr("data-th")
                .or_else(|| el.attr("aria-label"))
                .map(str::to_string);
            RawCell {
                text: clean_text(&cell),
                title,
                label,
            }
        })
        .collect();

    let titles = row
        .select(&TITLED)
        .filter_map(|t| t.value().attr("title"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    RawRow { cells, titles }
}

fn clean_text(el: &ElementRef) -> String {
    el.text()
        .flat_map(|chunk| chunk.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TABLES: &str = r#"
        <html><body>
        <table><tr><th>Menu</th></tr><tr><td>x</td></tr></table>
        <table id="resultado">
          <thead><tr><th>Papel</th><th>Segmento</th><th>P/VP</th></tr></thead>
          <tbody>
            <tr><td><a href="detalhes.php?papel=ABCD11" title="Fundo ABCD">ABCD11</a></td>
                <td>Logística</td><td>1,05</td></tr>
            <tr><td>Total</td><td></td><td></td></tr>
          </tbody>
        </table>
        </body></html>"#;

    #[test]
    fn test_locate_table_by_required_headers() {
        let table = locate_table(TWO_TABLES, &[&["papel"], &["p/vp", "p vp"], &["segmento", "setor"]])
            .unwrap();
        assert_eq!(table.headers, vec!["papel", "segmento", "p/vp"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].text(0), Some("ABCD11"));
        assert_eq!(table.rows[0].text(1), Some("Logística"));
        assert_eq!(table.rows[0].cells[0].title.as_deref(), Some("Fundo ABCD"));
        assert_eq!(table.rows[0].titles, vec!["Fundo ABCD"]);
    }

    #[test]
    fn test_locate_table_falls_back_to_first() {
        let table = locate_table(TWO_TABLES, &[&["nao existe"]]).unwrap();
        assert_eq!(table.headers, vec!["menu"]);
        assert!(locate_table("<p>sem tabela</p>", &[&["papel"]]).is_none());
    }

    #[test]
    fn test_nested_table_rows_stay_inside() {
        let html = r#"<table>
            <tr><th>Papel</th><th>Segmento</th><th>P/VP</th></tr>
            <tr><td>ABCD11</td><td><table><tr><td>EFGH11</td><td>x</td></tr></table></td><td>1,05</td></tr>
            <tr><td>IJKL11</td><td>Lajes</td><td>0,90</td></tr>
        </table>"#;
        let table = locate_table(html, &[&["papel"], &["p/vp"], &["segmento"]]).unwrap();
        assert_eq!(table.headers, vec!["papel", "segmento", "p/vp"]);
        let codes: Vec<_> = table.rows.iter().filter_map(|r| r.text(0)).collect();
        assert_eq!(codes, vec!["ABCD11", "IJKL11"]);
        assert_eq!(table.rows[0].cells.len(), 3);
        assert_eq!(table.rows[0].text(2), Some("1,05"));
    }

    #[test]
    fn test_key_value_pairs() {
        let html = r#"<table>
            <tr><td class="label"><span class="txt">Cotação</span></td><td><span>98,40</span></td>
                <td>Segmento</td><td>Híbrido</td></tr>
            <tr><td>Solitário</td></tr>
        </table>"#;
        let pairs = key_value_pairs(html);
        assert_eq!(
            pairs,
            vec![
                ("Cotação".to_string(), "98,40".to_string()),
                ("Segmento".to_string(), "Híbrido".to_string()),
            ]
        );
    }
}
