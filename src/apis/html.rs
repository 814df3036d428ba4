//! DOM walk shared by the public (HTML) adapters.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static TH: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());
static SELECT: Lazy<Selector> = Lazy::new(|| Selector::parse("select").unwrap());
static OPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("option").unwrap());
static INPUT: Lazy<Selector> = Lazy::new(|| Selector::parse("input").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static SVG: Lazy<Selector> = Lazy::new(|| Selector::parse("svg").unwrap());
static SECTION: Lazy<Selector> = Lazy::new(|| Selector::parse("section, div").unwrap());
static PROMINENT: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, span, div").unwrap());

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedTable {
    /// Every `<th>` in the table, in document order.
    pub header_cells: Vec<String>,
    /// Cell texts of every `<tr>` that has at least one cell.
    pub rows: Vec<Vec<String>>,
    /// Cell texts of every `<tr>` after the first, empty rows included.
    pub body_rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedSelect {
    pub name: Option<String>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedInput {
    pub name: Option<String>,
    pub input_type: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedImage {
    pub src: Option<String>,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedSection {
    pub id: Option<String>,
    pub class: Option<String>,
    pub text: String,
}

impl ScrapedSection {
    /// Section label for the layout: the id, else the class list.
    pub fn label(&self) -> Option<String> {
        self.id.clone().or_else(|| self.class.clone())
    }
}

/// Everything the public adapters read from a dashboard page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub tables: Vec<ScrapedTable>,
    pub selects: Vec<ScrapedSelect>,
    pub inputs: Vec<ScrapedInput>,
    pub images: Vec<ScrapedImage>,
    pub svgs: Vec<String>,
    pub sections: Vec<ScrapedSection>,
    /// Texts of headings, spans and divs that contain a digit.
    pub numeric_texts: Vec<String>,
    /// Visible text of the whole page, whitespace-joined.
    pub text: String,
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn attr(element: &ElementRef, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn row_cells(row: &ElementRef) -> Vec<String> {
    row.select(&CELL).map(|c| element_text(&c)).collect()
}

impl ScrapedPage {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);

        let tables = document
            .select(&TABLE)
            .map(|table| {
                let all_rows: Vec<Vec<String>> = table.select(&TR).map(|tr| row_cells(&tr)).collect();
                ScrapedTable {
                    header_cells: table.select(&TH).map(|th| element_text(&th)).collect(),
                    rows: all_rows.iter().filter(|r| !r.is_empty()).cloned().collect(),
                    body_rows: all_rows.into_iter().skip(1).collect(),
                }
            })
            .collect();

        let selects = document
            .select(&SELECT)
            .map(|select| ScrapedSelect {
                name: attr(&select, "name"),
                options: select.select(&OPTION).map(|o| element_text(&o)).collect(),
            })
            .collect();

        let inputs = document
            .select(&INPUT)
            .map(|input| ScrapedInput {
                name: attr(&input, "name"),
                input_type: attr(&input, "type").unwrap_or_else(|| "input".to_string()),
                value: input.value().attr("value").map(String::from),
            })
            .collect();

        let images = document
            .select(&IMG)
            .map(|img| ScrapedImage {
                src: attr(&img, "src"),
                alt: attr(&img, "alt"),
            })
            .collect();

        let svgs = document.select(&SVG).map(|svg| svg.html()).collect();

        let sections = document
            .select(&SECTION)
            .map(|section| ScrapedSection {
                id: attr(&section, "id"),
                class: attr(&section, "class"),
                text: element_text(&section),
            })
            .collect();

        let numeric_texts = document
            .select(&PROMINENT)
            .map(|el| element_text(&el))
            .filter(|t| t.chars().any(|c| c.is_ascii_digit()))
            .collect();

        let text = element_text(&document.root_element());

        Self {
            tables,
            selects,
            inputs,
            images,
            svgs,
            sections,
            numeric_texts,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <section id="header"><h1>Revenue 1,200</h1></section>
          <div class="grid main">
            <table>
              <tr><th>Region</th><th>Sales</th></tr>
              <tr><td>East</td><td>100</td></tr>
              <tr><td>West</td><td>150</td></tr>
            </table>
            <select name="region"><option>East</option><option>West</option></select>
            <input type="checkbox" name="active" value="yes">
            <img src="chart.png" alt="Sales Chart">
            <svg><rect width="10"/></svg>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_dashboard_page() {
        let page = ScrapedPage::parse(PAGE);

        assert_eq!(page.tables.len(), 1);
        let table = &page.tables[0];
        assert_eq!(table.header_cells, vec!["Region", "Sales"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.body_rows, vec![vec!["East", "100"], vec!["West", "150"]]);

        assert_eq!(page.selects[0].name.as_deref(), Some("region"));
        assert_eq!(page.selects[0].options, vec!["East", "West"]);
        assert_eq!(page.inputs[0].input_type, "checkbox");
        assert_eq!(page.inputs[0].value.as_deref(), Some("yes"));
        assert_eq!(page.images[0].alt.as_deref(), Some("Sales Chart"));
        assert_eq!(page.svgs.len(), 1);

        let labels: Vec<Option<String>> = page.sections.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec![Some("header".to_string()), Some("grid main".to_string())]);
        assert!(page.numeric_texts.iter().any(|t| t == "Revenue 1,200"));
        assert!(page.text.contains("Revenue 1,200"));
    }

    #[test]
    fn test_parse_empty_page() {
        let page = ScrapedPage::parse("<html><body><p>nothing here</p></body></html>");
        assert!(page.tables.is_empty());
        assert!(page.sections.is_empty());
        assert_eq!(page.text, "nothing here");
    }
}
