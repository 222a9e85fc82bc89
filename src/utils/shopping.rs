use std::io::Cursor;

use printpdf::{
    Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect, Rgb, path::PaintMode,
};
use serde::Serialize;
use sqlx::FromRow;

use crate::error::AppError;

/// Cyrillic-capable font embedded into every PDF list.
static PDF_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSerif.ttf");

// Landscape A4, millimetres
const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const TABLE_LEFT: f32 = 20.0;
const TITLE_TOP: f32 = 195.0;
const FIRST_TABLE_TOP: f32 = 185.0;
const NEXT_TABLE_TOP: f32 = 195.0;
const BOTTOM_MARGIN: f32 = 15.0;
const HEADER_HEIGHT: f32 = 11.0;
const ROW_HEIGHT: f32 = 8.0;
const CELL_PADDING: f32 = 2.0;
const COLUMN_WIDTHS: [f32; 3] = [150.0, 30.0, 50.0];
const PT_TO_MM: f32 = 0.3528;

const HEADER: [&str; 3] = ["Product", "Unit", "Amount"];

/// One aggregated shopping-list line.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Export formats for the shopping list.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ExportFormat {
    #[default]
    Pdf,
    Txt,
    Csv,
}

impl ExportFormat {
    /// Reads the `format` query parameter; absent or blank means the default.
    pub fn from_param(value: Option<&str>) -> Result<Self, AppError> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") => Ok(Self::default()),
            Some("pdf") => Ok(ExportFormat::Pdf),
            Some("txt") => Ok(ExportFormat::Txt),
            Some("csv") => Ok(ExportFormat::Csv),
            Some(other) => Err(AppError::field(
                "format",
                format!("Select a valid choice. {} is not one of the available choices.", other),
            )),
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Txt => "text/plain; charset=utf-8",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "shopping_list.pdf",
            ExportFormat::Txt => "shopping_list.txt",
            ExportFormat::Csv => "shopping_list.csv",
        }
    }

    pub fn render(self, items: &[ShoppingItem]) -> Result<Vec<u8>, AppError> {
        match self {
            ExportFormat::Pdf => render_pdf(items),
            ExportFormat::Txt => Ok(render_text(items).into_bytes()),
            ExportFormat::Csv => render_csv(items),
        }
    }
}

/// Plain-text list with the product column padded to the longest entry.
pub fn render_text(items: &[ShoppingItem]) -> String {
    let labels: Vec<String> = items
        .iter()
        .map(|item| format!("{} ({})", item.name, item.measurement_unit))
        .collect();
    let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let mut out = String::from("Shopping list\n\n");
    for (label, item) in labels.iter().zip(items) {
        let padding = width - label.chars().count();
        out.push_str(&format!("{}{} — {}\n", label, " ".repeat(padding), item.total));
    }
    out
}

pub fn render_csv(items: &[ShoppingItem]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let to_internal = |e: csv::Error| AppError::InternalServerError(e.to_string());

    writer
        .write_record(HEADER)
        .map_err(to_internal)?;
    for item in items {
        let total = item.total.to_string();
        writer
            .write_record([
                item.name.as_str(),
                item.measurement_unit.as_str(),
                total.as_str(),
            ])
            .map_err(to_internal)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

struct RowStyle {
    height: f32,
    font_size: f32,
    background: Color,
    text: Color,
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn header_style() -> RowStyle {
    RowStyle {
        height: HEADER_HEIGHT,
        font_size: 18.0,
        background: rgb(0.0, 0.0, 0.0),
        text: rgb(1.0, 1.0, 1.0),
    }
}

/// Body rows alternate between white and light grey.
fn body_style(index: usize) -> RowStyle {
    let shade = if index % 2 == 0 { 1.0 } else { 210.0 / 255.0 };
    RowStyle {
        height: ROW_HEIGHT,
        font_size: 14.0,
        background: rgb(shade, shade, shade),
        text: rgb(0.0, 0.0, 0.0),
    }
}

/// Draws one table row whose top edge is at `top` and returns the next row's top.
fn draw_row(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    top: f32,
    cells: [&str; 3],
    style: &RowStyle,
) -> f32 {
    let bottom = top - style.height;
    let baseline = bottom + (style.height - style.font_size * PT_TO_MM * 0.7) / 2.0;

    layer.set_outline_color(rgb(0.0, 0.0, 0.0));
    layer.set_outline_thickness(1.0);

    let mut left = TABLE_LEFT;
    for (cell, width) in cells.into_iter().zip(COLUMN_WIDTHS) {
        layer.set_fill_color(style.background.clone());
        layer.add_rect(
            Rect::new(Mm(left), Mm(bottom), Mm(left + width), Mm(top))
                .with_mode(PaintMode::FillStroke),
        );
        layer.set_fill_color(style.text.clone());
        layer.use_text(cell, style.font_size, Mm(left + CELL_PADDING), Mm(baseline), font);
        left += width;
    }

    bottom
}

/// Landscape A4 document: a title, then a three-column table
/// (product, unit, amount) that continues onto new pages as needed.
pub fn render_pdf(items: &[ShoppingItem]) -> Result<Vec<u8>, AppError> {
    let to_internal = |e: printpdf::Error| AppError::InternalServerError(e.to_string());

    let (doc, page, layer) =
        PdfDocument::new("Shopping list", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Table");
    let font = doc
        .add_external_font(Cursor::new(PDF_FONT))
        .map_err(to_internal)?;

    let mut layer = doc.get_page(page).get_layer(layer);
    layer.set_fill_color(rgb(0.0, 0.0, 0.0));
    layer.use_text("Shopping list", 24.0, Mm(TABLE_LEFT), Mm(TITLE_TOP), &font);
    let mut top = draw_row(&layer, &font, FIRST_TABLE_TOP, HEADER, &header_style());

    for (index, item) in items.iter().enumerate() {
        if top - ROW_HEIGHT < BOTTOM_MARGIN {
            let (page, next) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Table");
            layer = doc.get_page(page).get_layer(next);
            top = draw_row(&layer, &font, NEXT_TABLE_TOP, HEADER, &header_style());
        }

        let total = item.total.to_string();
        top = draw_row(
            &layer,
            &font,
            top,
            [item.name.as_str(), item.measurement_unit.as_str(), total.as_str()],
            &body_style(index),
        );
    }

    doc.save_to_bytes().map_err(to_internal)
}
