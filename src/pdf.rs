//! Small flowable layout engine on top of `lopdf`.
//!
//! Blocks (paragraphs, spacers, tables, images) are stacked top to bottom on
//! A4 pages with one-inch margins; a block that does not fit starts a new
//! page. Text uses the standard Helvetica fonts with WinAnsi encoding.

use crate::charts::RgbImage;
use crate::error::DashboardResult;
use chrono::NaiveDateTime;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 72.0;
pub const FRAME_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const FRAME_HEIGHT: f32 = PAGE_HEIGHT - 2.0 * MARGIN;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";
const CELL_PADDING: f32 = 3.0;
const HEADER_BOTTOM_PADDING: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Body,
}

impl TextStyle {
    fn size(self) -> f32 {
        match self {
            TextStyle::Title => 18.0,
            TextStyle::Heading => 14.0,
            TextStyle::Body => 10.0,
        }
    }

    fn space_after(self) -> f32 {
        match self {
            TextStyle::Title => 30.0,
            TextStyle::Heading => 12.0,
            TextStyle::Body => 6.0,
        }
    }

    fn bold(self) -> bool {
        !matches!(self, TextStyle::Body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    /// First row is the header.
    pub rows: Vec<Vec<String>>,
    /// Column widths in points; natural widths when absent.
    pub col_widths: Option<Vec<f32>>,
    pub header_size: f32,
    pub body_size: f32,
}

impl TableBlock {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            col_widths: None,
            header_size: 10.0,
            body_size: 10.0,
        }
    }

    pub fn with_widths(mut self, widths: Vec<f32>) -> Self {
        self.col_widths = Some(widths);
        self
    }

    pub fn with_font_sizes(mut self, header: f32, body: f32) -> Self {
        self.header_size = header;
        self.body_size = body;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Block {
    Paragraph(String, TextStyle),
    Spacer(f32),
    Table(TableBlock),
    Image { image: RgbImage, width: f32 },
}

pub struct DocumentInfo {
    pub title: String,
    pub created: NaiveDateTime,
}

/// Helvetica advance widths (1/1000 em), coarse but close enough for layout.
fn char_width(c: char) -> f32 {
    match c {
        'i' | 'j' | 'l' | '\'' | '|' => 222.0,
        ' ' | '.' | ',' | ':' | ';' | '!' | 'f' | 't' | 'I' | '/' | '[' | ']' => 278.0,
        'r' | '-' | '(' | ')' => 333.0,
        'm' | 'M' => 833.0,
        'W' => 944.0,
        'w' => 722.0,
        '%' => 889.0,
        c if c.is_ascii_uppercase() => 667.0,
        _ => 556.0,
    }
}

pub fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let units: f32 = text.chars().map(char_width).sum();
    let scale = if bold { 1.05 } else { 1.0 };
    units * size / 1000.0 * scale
}

/// Greedy word wrap; words wider than the line are broken by character.
pub fn wrap_text(text: &str, max_width: f32, size: f32, bold: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if text_width(&candidate, size, bold) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for c in word.chars() {
            current.push(c);
            if text_width(&current, size, bold) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn truncate_to_width(text: &str, max_width: f32, size: f32, bold: bool) -> String {
    if text_width(text, size, bold) <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        out.push(c);
        if text_width(&format!("{}...", out), size, bold) > max_width {
            out.pop();
            break;
        }
    }
    format!("{}...", out)
}

/// WinAnsi bytes for the standard fonts; anything outside Latin-1 becomes `?`.
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[derive(Default)]
struct Page {
    ops: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

struct Layout<'d> {
    doc: &'d mut Document,
    pages: Vec<Page>,
    /// Top of the free space on the current page.
    y: f32,
    image_count: usize,
}

impl<'d> Layout<'d> {
    fn new(doc: &'d mut Document) -> Self {
        Self {
            doc,
            pages: vec![Page::default()],
            y: PAGE_HEIGHT - MARGIN,
            image_count: 0,
        }
    }

    fn page(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.pages.push(Page::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Starts a new page unless `height` fits; returns whether it did.
    fn ensure(&mut self, height: f32) -> bool {
        let at_top = (self.y - (PAGE_HEIGHT - MARGIN)).abs() < f32::EPSILON;
        if self.y - height < MARGIN && !at_top {
            self.new_page();
            return true;
        }
        false
    }

    fn push(&mut self, op: &str, operands: Vec<Object>) {
        self.page().ops.push(Operation::new(op, operands));
    }

    fn text(&mut self, x: f32, baseline: f32, text: &str, size: f32, bold: bool, gray: f32) {
        let font = if bold { BOLD } else { REGULAR };
        self.push("BT", vec![]);
        self.push("g", vec![gray.into()]);
        self.push("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]);
        self.push("Td", vec![x.into(), baseline.into()]);
        self.push(
            "Tj",
            vec![Object::String(encode_text(text), StringFormat::Literal)],
        );
        self.push("ET", vec![]);
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgb: (f32, f32, f32)) {
        self.push("rg", vec![rgb.0.into(), rgb.1.into(), rgb.2.into()]);
        self.push("re", vec![x.into(), y.into(), w.into(), h.into()]);
        self.push("f", vec![]);
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.push("w", vec![1.0f32.into()]);
        self.push("G", vec![0.0f32.into()]);
        self.push("re", vec![x.into(), y.into(), w.into(), h.into()]);
        self.push("S", vec![]);
    }

    fn paragraph(&mut self, text: &str, style: TextStyle) {
        let size = style.size();
        let bold = style.bold();
        let line_height = size * 1.2;
        for line in wrap_text(text, FRAME_WIDTH, size, bold) {
            self.ensure(line_height);
            let x = if style == TextStyle::Title {
                MARGIN + (FRAME_WIDTH - text_width(&line, size, bold)).max(0.0) / 2.0
            } else {
                MARGIN
            };
            let baseline = self.y - size;
            self.text(x, baseline, &line, size, bold, 0.0);
            self.y -= line_height;
        }
        self.y -= style.space_after();
    }

    fn spacer(&mut self, height: f32) {
        if !self.ensure(height) {
            self.y -= height;
        }
    }

    fn column_widths(table: &TableBlock, columns: usize) -> Vec<f32> {
        if let Some(widths) = &table.col_widths {
            if widths.len() == columns {
                return widths.clone();
            }
        }
        let mut natural = vec![0.0f32; columns];
        for (r, row) in table.rows.iter().enumerate() {
            let (size, bold) = if r == 0 {
                (table.header_size, true)
            } else {
                (table.body_size, false)
            };
            for (c, cell) in row.iter().enumerate().take(columns) {
                let w = text_width(cell, size, bold) + 2.0 * CELL_PADDING + 2.0;
                natural[c] = natural[c].max(w);
            }
        }
        let total: f32 = natural.iter().sum();
        if total > FRAME_WIDTH {
            let scale = FRAME_WIDTH / total;
            natural.iter_mut().for_each(|w| *w *= scale);
        }
        natural
    }

    fn table_row(&mut self, cells: &[String], widths: &[f32], x0: f32, header: bool, table: &TableBlock) {
        let size = if header { table.header_size } else { table.body_size };
        let height = size * 1.2
            + CELL_PADDING
            + if header { HEADER_BOTTOM_PADDING } else { CELL_PADDING };
        let bottom = self.y - height;
        let total: f32 = widths.iter().sum();
        let background = if header {
            (0.5, 0.5, 0.5)
        } else {
            (0.96, 0.96, 0.86)
        };
        self.fill_rect(x0, bottom, total, height, background);
        let mut x = x0;
        for (c, width) in widths.iter().enumerate() {
            self.stroke_rect(x, bottom, *width, height);
            let raw = cells.get(c).map(String::as_str).unwrap_or("");
            let text = truncate_to_width(raw, width - 2.0 * CELL_PADDING, size, header);
            let tw = text_width(&text, size, header);
            let tx = x + (width - tw).max(0.0) / 2.0;
            let baseline = self.y - CELL_PADDING - size;
            let gray = if header { 0.96 } else { 0.0 };
            self.text(tx, baseline, &text, size, header, gray);
            x += width;
        }
        self.y = bottom;
    }

    fn row_height(table: &TableBlock, header: bool) -> f32 {
        if header {
            table.header_size * 1.2 + CELL_PADDING + HEADER_BOTTOM_PADDING
        } else {
            table.body_size * 1.2 + 2.0 * CELL_PADDING
        }
    }

    fn table(&mut self, table: &TableBlock) {
        let Some(header) = table.rows.first() else {
            return;
        };
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let widths = Self::column_widths(table, columns);
        let x0 = MARGIN + (FRAME_WIDTH - widths.iter().sum::<f32>()).max(0.0) / 2.0;
        let header_height = Self::row_height(table, true);
        let body_height = Self::row_height(table, false);

        self.ensure(header_height + body_height);
        self.table_row(header, &widths, x0, true, table);
        for row in table.rows.iter().skip(1) {
            if self.ensure(body_height) {
                // Repeat the header on continuation pages.
                self.table_row(header, &widths, x0, true, table);
            }
            self.table_row(row, &widths, x0, false, table);
        }
    }

    fn image(&mut self, image: &RgbImage, width: f32) {
        if image.width == 0 || image.height == 0 {
            return;
        }
        let mut w = width.min(FRAME_WIDTH);
        let mut h = w * image.height as f32 / image.width as f32;
        if h > FRAME_HEIGHT {
            w *= FRAME_HEIGHT / h;
            h = FRAME_HEIGHT;
        }
        self.ensure(h);
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
            },
            image.pixels.clone(),
        );
        let id = self.doc.add_object(stream);
        self.page().images.push((name.clone(), id));

        let x = MARGIN + (FRAME_WIDTH - w) / 2.0;
        let bottom = self.y - h;
        self.push("q", vec![]);
        self.push(
            "cm",
            vec![w.into(), 0.0f32.into(), 0.0f32.into(), h.into(), x.into(), bottom.into()],
        );
        self.push("Do", vec![Object::Name(name.into_bytes())]);
        self.push("Q", vec![]);
        self.y = bottom - 6.0;
    }
}

/// Lays out `blocks` and serializes the finished document.
pub fn render(blocks: &[Block], info: &DocumentInfo) -> DashboardResult<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages = {
        let mut layout = Layout::new(&mut doc);
        for block in blocks {
            match block {
                Block::Paragraph(text, style) => layout.paragraph(text, *style),
                Block::Spacer(h) => layout.spacer(*h),
                Block::Table(table) => layout.table(table),
                Block::Image { image, width } => layout.image(image, *width),
            }
        }
        layout.pages
    };

    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let mut xobjects = Dictionary::new();
        for (name, id) in &page.images {
            xobjects.set(name.as_bytes().to_vec(), *id);
        }
        let resources = dictionary! {
            "Font" => dictionary! {
                REGULAR => regular_id,
                BOLD => bold_id,
            },
            "XObject" => xobjects,
        };
        let content = Content {
            operations: page.ops,
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let media_box: Vec<Object> = vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => media_box,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(encode_text(&info.title), StringFormat::Literal),
        "Producer" => Object::string_literal(concat!("digital_report ", env!("CARGO_PKG_VERSION"))),
        "CreationDate" => Object::string_literal(info.created.format("D:%Y%m%d%H%M%S").to_string()),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn info() -> DocumentInfo {
        DocumentInfo {
            title: "Test".into(),
            created: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
        }
    }

    /// Text drawn with `Tj` on each page, decoded from the saved bytes.
    /// Number of image XObjects in a rendered document.
    pub(crate) fn image_count(bytes: &[u8]) -> usize {
        let doc = Document::load_mem(bytes).unwrap();
        doc.objects
            .values()
            .filter(|o| match o {
                Object::Stream(s) => matches!(s.dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Image"),
                _ => false,
            })
            .count()
    }

    pub(crate) fn page_texts(bytes: &[u8]) -> Vec<Vec<String>> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| {
                let raw = doc.get_page_content(*id).unwrap();
                let content = Content::decode(&raw).unwrap();
                content
                    .operations
                    .iter()
                    .filter(|op| op.operator == "Tj")
                    .filter_map(|op| match op.operands.first() {
                        Some(Object::String(bytes, _)) => Some(bytes.iter().map(|b| *b as char).collect()),
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn wrapping_respects_width() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let lines = wrap_text(text, 100.0, 10.0, false);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 10.0, false) <= 100.0, "{line}");
        }
        assert_eq!(lines.join(" "), text);
        assert_eq!(wrap_text("", 100.0, 10.0, false), vec![String::new()]);
    }

    #[test]
    fn long_words_are_broken() {
        let lines = wrap_text(&"x".repeat(200), 50.0, 10.0, false);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 200);
    }

    #[test]
    fn truncation_adds_ellipsis() {
        let t = truncate_to_width("a very long company name indeed", 40.0, 10.0, false);
        assert!(t.ends_with("..."));
        assert_eq!(truncate_to_width("ok", 40.0, 10.0, false), "ok");
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(encode_text("A企业é"), vec![b'A', b'?', b'?', 0xE9]);
    }

    #[test]
    fn renders_paragraphs_and_tables() {
        let mut rows = vec![vec!["Item".to_string(), "Value".to_string()]];
        for i in 0..80 {
            rows.push(vec![format!("row {}", i), i.to_string()]);
        }
        let blocks = vec![
            Block::Paragraph("Report Title".into(), TextStyle::Title),
            Block::Spacer(12.0),
            Block::Table(TableBlock::new(rows)),
            Block::Paragraph("The end".into(), TextStyle::Body),
        ];
        let bytes = render(&blocks, &info()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let pages = page_texts(&bytes);
        assert!(pages.len() >= 2, "80 rows should overflow one page");
        assert_eq!(pages[0][0], "Report Title");
        assert!(pages[0].contains(&"Item".to_string()));
        // Header repeated on the continuation page.
        assert_eq!(pages[1][0], "Item");
        assert!(pages.last().unwrap().contains(&"The end".to_string()));
    }

    #[test]
    fn images_become_xobjects() {
        let image = RgbImage {
            width: 2,
            height: 2,
            pixels: vec![255; 12],
        };
        let blocks = vec![Block::Image { image, width: 200.0 }];
        let bytes = render(&blocks, &info()).unwrap();
        assert_eq!(image_count(&bytes), 1);
    }
}
