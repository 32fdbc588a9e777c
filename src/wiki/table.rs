//! Municipality list table of a rendered Wikipedia article.

use scraper::{ElementRef, Html, Selector};

use crate::error::DatasetError;

/// Background colour marking municipalities with official city status.
const OFFICIAL_CITY_BGCOLOR: &str = "#bbf3ff";

#[derive(Debug, Clone, PartialEq)]
pub struct MunicipalityRow {
    pub display_name: String,
    /// Linked article title, or the display name when the cell has no link.
    pub wiki_title: String,
    /// Path segment after `/wiki/` of the link, if any.
    pub wiki_slug: Option<String>,
    pub num_settlements: Option<u64>,
    pub population_2013: Option<u64>,
    pub density_per_km2: Option<f64>,
    pub area_km2: Option<f64>,
    pub is_official_city: bool,
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

/// Text nodes of `element`, trimmed, joined by single spaces.
fn cell_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses the first `wikitable` of `html`. `page` only labels errors.
pub fn parse_municipality_table(html: &str, page: &str) -> Result<Vec<MunicipalityRow>, DatasetError> {
    let document = Html::parse_document(html);
    let table = document
        .select(&selector("table.wikitable"))
        .next()
        .ok_or_else(|| DatasetError::MissingTable { page: page.to_owned() })?;

    let row_selector = selector("tr");
    let cell_selector = selector("td");
    let link_selector = selector("a");

    let mut rows = Vec::new();
    for tr in table.select(&row_selector) {
        let cells: Vec<ElementRef> = tr.select(&cell_selector).collect();
        let Some(name_cell) = cells.first() else {
            continue;
        };
        let display_name = cell_text(*name_cell);
        let link = name_cell.select(&link_selector).next();
        let wiki_title = link
            .and_then(|a| a.value().attr("title"))
            .map(str::to_owned)
            .unwrap_or_else(|| display_name.clone());
        let wiki_slug = link
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| href.strip_prefix("/wiki/"))
            .map(str::to_owned);

        let text_at = |index: usize| cells.get(index).map(|cell| cell_text(*cell));
        rows.push(MunicipalityRow {
            display_name,
            wiki_title,
            wiki_slug,
            num_settlements: text_at(1).as_deref().and_then(parse_int),
            population_2013: text_at(2).as_deref().and_then(parse_int),
            density_per_km2: text_at(3).as_deref().and_then(parse_float),
            area_km2: text_at(4).as_deref().and_then(parse_float),
            is_official_city: tr
                .value()
                .attr("bgcolor")
                .is_some_and(|color| color.eq_ignore_ascii_case(OFFICIAL_CITY_BGCOLOR)),
        });
    }

    if rows.is_empty() {
        return Err(DatasetError::EmptyTable { page: page.to_owned() });
    }
    Ok(rows)
}

/// Text before any parenthesized note, trimmed.
fn leading_figure(text: &str) -> &str {
    text.split('(').next().unwrap_or_default().trim()
}

fn is_separator(ch: char) -> bool {
    ch == ' ' || ch == '\u{a0}'
}

/// `12.345 (2013)` -> 12345. Dots and commas are thousands separators.
pub fn parse_int(text: &str) -> Option<u64> {
    let cleaned: String = leading_figure(text)
        .chars()
        .filter(|&ch| ch != '.' && ch != ',' && !is_separator(ch))
        .collect();
    if cleaned.is_empty() || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

/// `1.234,5` -> 1234.5. Dots are thousands separators, the comma is decimal.
pub fn parse_float(text: &str) -> Option<f64> {
    let cleaned: String = leading_figure(text)
        .chars()
        .filter(|&ch| ch != '.' && !is_separator(ch))
        .map(|ch| if ch == ',' { '.' } else { ch })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <div class="mw-parser-output">
        <table class="infobox"><tr><td>ignored</td></tr></table>
        <table class="wikitable sortable">
          <tr><th>Općina</th><th>Naselja</th><th>Stanovništvo</th><th>Gustina</th><th>Površina</th></tr>
          <tr bgcolor="#BBF3FF">
            <td><a href="/wiki/Banja_Luka" title="Banja Luka">Banja Luka</a></td>
            <td>54</td><td>185.042 (2013)</td><td>150,9</td><td>1.232,2</td>
          </tr>
          <tr>
            <td><a href="/wiki/Op%C4%87ina_Bosanski_Petrovac" title="Općina Bosanski Petrovac">Bosanski   Petrovac</a></td>
            <td>36</td><td>7 328</td><td>10,4</td><td>&nbsp;</td>
          </tr>
          <tr><td>Kupres <small>(RS)</small></td></tr>
        </table>
        </div>"##;

    #[test]
    fn parses_rows() {
        let rows = parse_municipality_table(PAGE, "Općine").unwrap();
        assert_eq!(rows.len(), 3);

        let banja_luka = &rows[0];
        assert_eq!(banja_luka.display_name, "Banja Luka");
        assert_eq!(banja_luka.wiki_title, "Banja Luka");
        assert_eq!(banja_luka.wiki_slug.as_deref(), Some("Banja_Luka"));
        assert_eq!(banja_luka.num_settlements, Some(54));
        assert_eq!(banja_luka.population_2013, Some(185_042));
        assert_eq!(banja_luka.density_per_km2, Some(150.9));
        assert_eq!(banja_luka.area_km2, Some(1232.2));
        assert!(banja_luka.is_official_city);

        let petrovac = &rows[1];
        assert_eq!(petrovac.wiki_title, "Općina Bosanski Petrovac");
        assert_eq!(petrovac.population_2013, Some(7328));
        assert_eq!(petrovac.area_km2, None);
        assert!(!petrovac.is_official_city);

        let kupres = &rows[2];
        assert_eq!(kupres.display_name, "Kupres (RS)");
        assert_eq!(kupres.wiki_title, "Kupres (RS)");
        assert_eq!(kupres.wiki_slug, None);
        assert_eq!(kupres.num_settlements, None);
    }

    #[test]
    fn missing_or_empty_table_is_an_error() {
        let err = parse_municipality_table("<p>nothing here</p>", "Općine").unwrap_err();
        assert!(matches!(err, DatasetError::MissingTable { .. }));

        let err = parse_municipality_table(
            r#"<table class="wikitable"><tr><th>Općina</th></tr></table>"#,
            "Općine",
        ).unwrap_err();
        assert!(matches!(err, DatasetError::EmptyTable { .. }));
    }

    #[test]
    fn numeric_cells() {
        assert_eq!(parse_int("1.234"), Some(1234));
        assert_eq!(parse_int("12\u{a0}345"), Some(12345));
        assert_eq!(parse_int("n/a"), None);
        assert_eq!(parse_int("(2013)"), None);
        assert_eq!(parse_float("1.234,56"), Some(1234.56));
        assert_eq!(parse_float("78 (procjena)"), Some(78.0));
        assert_eq!(parse_float(""), None);
        assert_eq!(parse_float("—"), None);
    }
}
