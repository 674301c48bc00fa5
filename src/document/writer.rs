use super::embed::image_xobject;
use crate::capture::CaptureError;
use crate::models::OutputDocument;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const IMAGE_RESOURCE: &[u8] = b"Im0";

/// Serializes an assembled document to PDF.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArtifactWriter;

impl ArtifactWriter {
    pub fn new() -> Self {
        Self
    }

    /// Render the whole PDF into memory.
    pub fn render(&self, document: &OutputDocument) -> Result<Vec<u8>, CaptureError> {
        let mut pdf = build_pdf(document)?;
        let mut output = Vec::new();
        pdf.save_to(&mut output)
            .map_err(|e| CaptureError::Pdf(format!("Failed to save PDF: {}", e)))?;
        Ok(output)
    }

    /// Write the PDF to `path`.
    ///
    /// Bytes go to `<path>.tmp` first and are renamed into place only after
    /// a successful sync, so a failed run never leaves a truncated file
    /// under the final name.
    pub fn write(&self, document: &OutputDocument, path: &Path) -> Result<PathBuf, CaptureError> {
        let bytes = self.render(document)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CaptureError::WriteFailure {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp_path = temp_path(path);
        let written = File::create(&tmp_path).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        let result = written.and_then(|_| std::fs::rename(&tmp_path, path));

        if let Err(source) = result {
            // Cleanup partial file on error
            let _ = std::fs::remove_file(&tmp_path);
            return Err(CaptureError::WriteFailure {
                path: path.to_path_buf(),
                source,
            });
        }

        log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path.to_path_buf())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn build_pdf(document: &OutputDocument) -> Result<Document, CaptureError> {
    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();
    let mut kids = Vec::with_capacity(document.page_count());

    for page in &document.pages {
        let embedded = image_xobject(&page.image)?;
        let mut image_stream = embedded.stream;
        if let Some(mask) = embedded.smask {
            let mask_id = pdf.add_object(mask);
            image_stream.dict.set("SMask", Object::Reference(mask_id));
        }
        let image_id = pdf.add_object(image_stream);

        log::debug!(
            "Page {}: {}x{} {:?} from {}",
            kids.len() + 1,
            page.width,
            page.height,
            page.orientation,
            page.image.source_url
        );
        let (width, height) = (i64::from(page.width), i64::from(page.height));

        // Scale the unit image square to the full page, anchored at the origin
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0.into(),
                        0.into(),
                        height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| CaptureError::Pdf(format!("Failed to encode page content: {}", e)))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => Object::Array(vec![0.into(), 0.into(), width.into(), height.into()]),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => Object::Reference(image_id),
                },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(kids),
            "Count" => count,
        }),
    );

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    pdf.trailer.set("Root", Object::Reference(catalog_id));

    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRecord, Orientation, OutputPage};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Arc;

    fn png_page(url: &str, width: u32, height: u32) -> OutputPage {
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::from(RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])))
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        OutputPage {
            width,
            height,
            orientation: Orientation::for_size(width, height),
            image: Arc::new(ImageRecord::from_content_type(url, "image/png", bytes.into_inner()).unwrap()),
        }
    }

    fn media_boxes(bytes: &[u8]) -> Vec<Vec<i64>> {
        let pdf = Document::load_mem(bytes).unwrap();
        pdf.get_pages()
            .values()
            .map(|id| {
                let page = pdf.get_object(*id).unwrap().as_dict().unwrap();
                page.get(b"MediaBox")
                    .unwrap()
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|v| v.as_i64().unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_render_one_page_per_image() {
        let document = OutputDocument {
            pages: vec![
                png_page("https://cdn/1.png", 800, 600),
                png_page("https://cdn/2.png", 600, 800),
                png_page("https://cdn/3.png", 500, 500),
            ],
        };

        let bytes = ArtifactWriter::new().render(&document).unwrap();

        assert_eq!(
            media_boxes(&bytes),
            vec![vec![0, 0, 800, 600], vec![0, 0, 600, 800], vec![0, 0, 500, 500]]
        );
    }

    #[test]
    fn test_write_renames_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("issue-1.pdf");
        let document = OutputDocument {
            pages: vec![png_page("https://cdn/1.png", 400, 600)],
        };

        let written = ArtifactWriter::new().write(&document, &path).unwrap();

        assert_eq!(written, path);
        assert!(path.exists());
        assert!(!temp_path(&path).exists());
        assert_eq!(media_boxes(&std::fs::read(&path).unwrap()).len(), 1);
    }

    #[test]
    fn test_write_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory already sits where the temp file would go
        let path = dir.path().join("blocked.pdf");
        std::fs::create_dir(temp_path(&path)).unwrap();
        let document = OutputDocument {
            pages: vec![png_page("https://cdn/1.png", 400, 600)],
        };

        match ArtifactWriter::new().write(&document, &path) {
            Err(CaptureError::WriteFailure { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected write failure, got {:?}", other),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(temp_path(Path::new("out/a.pdf")), PathBuf::from("out/a.pdf.tmp"));
    }
}
