use image::DynamicImage;
use log::{info, warn};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

use super::{SheetDocument, export_file_name};
use crate::character::CharacterSheet;
use crate::error::Result;
use crate::settings::Settings;

const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 50.0;
const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 10.0;
const LINE_HEIGHT: f32 = 14.0;
const WRAP_WIDTH: usize = 90;
const AVATAR_SIZE: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    Regular,
    Bold,
}

/// A line of text at its final position, in points from the bottom-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub weight: Weight,
}

struct Cursor {
    pages: Vec<Vec<PlacedLine>>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Cursor {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN - TITLE_SIZE,
        }
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT - MARGIN - BODY_SIZE;
        }
    }

    fn put(&mut self, text: &str, size: f32, weight: Weight, advance: f32) {
        self.ensure_room(size);
        if let Some(page) = self.pages.last_mut() {
            page.push(PlacedLine {
                text: text.to_string(),
                x: MARGIN,
                y: self.y,
                size,
                weight,
            });
        }
        self.y -= advance;
    }
}

// Lays the document out on A4 pages. The first page leaves room for the avatar when present.
pub fn paginate(document: &SheetDocument, with_avatar: bool) -> Vec<Vec<PlacedLine>> {
    let mut cursor = Cursor::new();
    cursor.put(&document.title, TITLE_SIZE, Weight::Bold, LINE_HEIGHT * 2.0);
    if with_avatar {
        cursor.y = cursor.y.min(PAGE_HEIGHT - MARGIN - AVATAR_SIZE - LINE_HEIGHT);
    }

    for section in &document.sections {
        cursor.ensure_room(HEADING_SIZE + LINE_HEIGHT);
        cursor.put(&section.title, HEADING_SIZE, Weight::Bold, LINE_HEIGHT * 1.3);
        for line in &section.lines {
            for wrapped in textwrap::wrap(line, WRAP_WIDTH) {
                cursor.put(&wrapped, BODY_SIZE, Weight::Regular, LINE_HEIGHT);
            }
        }
        cursor.y -= LINE_HEIGHT / 2.0;
    }
    cursor.pages
}

#[derive(Debug, Clone)]
pub struct PdfExporter {
    library_path: Option<String>,
    export_dir: PathBuf,
}

impl PdfExporter {
    pub fn new(library_path: Option<String>, export_dir: PathBuf) -> Self {
        PdfExporter {
            library_path,
            export_dir,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        PdfExporter::new(settings.pdfium_lib_path.clone(), settings.export_dir())
    }

    pub fn target_path(&self, sheet: &CharacterSheet) -> PathBuf {
        self.export_dir.join(export_file_name(sheet))
    }

    fn bind(&self) -> Result<Pdfium> {
        let bindings = match &self.library_path {
            Some(path) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))?
            }
            None => Pdfium::bind_to_system_library()?,
        };
        Ok(Pdfium::new(bindings))
    }

    pub fn render(
        &self,
        document: &SheetDocument,
        avatar: Option<&DynamicImage>,
        path: &Path,
    ) -> Result<()> {
        let pdfium = self.bind()?;
        let mut pdf = pdfium.create_new_pdf()?;
        let regular = pdf.fonts_mut().helvetica();
        let bold = pdf.fonts_mut().helvetica_bold();

        for (index, lines) in paginate(document, avatar.is_some()).iter().enumerate() {
            let mut page = pdf
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::a4())?;
            if index == 0 {
                if let Some(image) = avatar {
                    page.objects_mut().create_image_object(
                        PdfPoints::new(PAGE_WIDTH - MARGIN - AVATAR_SIZE),
                        PdfPoints::new(PAGE_HEIGHT - MARGIN - AVATAR_SIZE),
                        image,
                        Some(PdfPoints::new(AVATAR_SIZE)),
                        Some(PdfPoints::new(AVATAR_SIZE)),
                    )?;
                }
            }
            for line in lines {
                let font = match line.weight {
                    Weight::Regular => regular,
                    Weight::Bold => bold,
                };
                page.objects_mut().create_text_object(
                    PdfPoints::new(line.x),
                    PdfPoints::new(line.y),
                    &line.text,
                    font,
                    PdfPoints::new(line.size),
                )?;
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        pdf.save_to_file(path)?;
        Ok(())
    }

    /// Writes `{name}.pdf` into the export directory. Rendering runs on the blocking pool.
    pub async fn export(&self, sheet: &CharacterSheet, avatar: Option<Vec<u8>>) -> Result<PathBuf> {
        let document = SheetDocument::from_sheet(sheet);
        let path = self.target_path(sheet);
        let exporter = self.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || {
            let image = avatar.and_then(|bytes| match image::load_from_memory(&bytes) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!("Skipping unreadable avatar: {}", e);
                    None
                }
            });
            exporter.render(&document, image.as_ref(), &target)
        })
        .await??;
        info!("Exported sheet to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::Section;

    fn document(lines: usize) -> SheetDocument {
        SheetDocument {
            title: "Scheda di Jinbe".to_string(),
            sections: vec![Section {
                title: "Note".to_string(),
                lines: (0..lines).map(|i| format!("riga {}", i)).collect(),
            }],
            image_url: None,
        }
    }

    #[test]
    fn title_opens_the_first_page() {
        let pages = paginate(&document(3), false);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0][0].text, "Scheda di Jinbe");
        assert_eq!(pages[0][0].weight, Weight::Bold);
        assert_eq!(pages[0].len(), 5);
    }

    #[test]
    fn long_documents_break_onto_new_pages() {
        let pages = paginate(&document(120), false);
        assert!(pages.len() > 1);
        for page in &pages {
            assert!(page.iter().all(|line| line.y >= MARGIN));
        }
    }

    #[test]
    fn long_lines_are_wrapped() {
        let mut doc = document(0);
        doc.sections[0].lines.push("parola ".repeat(40));
        let pages = paginate(&doc, false);
        let body: Vec<_> = pages[0].iter().filter(|l| l.weight == Weight::Regular).collect();
        assert!(body.len() > 1);
        assert!(body.iter().all(|line| line.text.chars().count() <= WRAP_WIDTH));
    }

    #[test]
    fn avatar_pushes_content_down() {
        let without = paginate(&document(1), false);
        let with = paginate(&document(1), true);
        assert!(with[0][1].y < without[0][1].y);
    }

    #[test]
    fn export_path_uses_the_character_name() {
        let exporter = PdfExporter::new(None, PathBuf::from("/tmp/out"));
        let mut sheet = CharacterSheet::new_for("u1");
        sheet.name = "Nico Robin".to_string();
        assert_eq!(exporter.target_path(&sheet), PathBuf::from("/tmp/out/Nico Robin.pdf"));
    }
}
