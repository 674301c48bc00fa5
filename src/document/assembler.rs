use crate::capture::{CaptureError, ImageStore};
use crate::models::{OutputDocument, OutputPage, PageElement};

/// Builds the ordered page list from DOM order and captured images.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentAssembler;

impl DocumentAssembler {
    pub fn new() -> Self {
        Self
    }

    /// One page per element, in element order.
    ///
    /// Fails on the first element whose image was never captured; no
    /// partial document is produced.
    pub fn assemble(
        &self,
        elements: &[PageElement],
        store: &ImageStore,
    ) -> Result<OutputDocument, CaptureError> {
        let mut pages = Vec::with_capacity(elements.len());

        for (index, element) in elements.iter().enumerate() {
            let image = store
                .get(&element.src)
                .ok_or_else(|| CaptureError::CaptureMismatch {
                    url: element.src.clone(),
                })?;

            if element.width == 0 || element.height == 0 {
                log::warn!(
                    "Page {} ({}) has no rendered size {}x{}, using 1x1",
                    index + 1,
                    element.src,
                    element.width,
                    element.height
                );
            }
            let width = element.width.max(1);
            let height = element.height.max(1);

            pages.push(OutputPage {
                width,
                height,
                orientation: element.orientation(),
                image,
            });
        }

        Ok(OutputDocument { pages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRecord, Orientation};

    fn store_with(urls: &[&str]) -> ImageStore {
        let store = ImageStore::new();
        for url in urls {
            store.upsert(ImageRecord::from_content_type(url, "image/png", url.as_bytes().to_vec()).unwrap());
        }
        store
    }

    #[test]
    fn test_pages_follow_element_order() {
        // Inserted in a different order than the DOM lists them
        let store = store_with(&["https://cdn/3.png", "https://cdn/1.png", "https://cdn/2.png"]);
        let elements = vec![
            PageElement::new("https://cdn/1.png", 400, 600),
            PageElement::new("https://cdn/2.png", 600, 400),
            PageElement::new("https://cdn/3.png", 500, 500),
        ];

        let document = DocumentAssembler::new().assemble(&elements, &store).unwrap();

        let urls: Vec<&str> = document.pages.iter().map(|p| p.image.source_url.as_str()).collect();
        assert_eq!(urls, ["https://cdn/1.png", "https://cdn/2.png", "https://cdn/3.png"]);
        let shapes: Vec<(u32, u32, Orientation)> = document
            .pages
            .iter()
            .map(|p| (p.width, p.height, p.orientation))
            .collect();
        assert_eq!(
            shapes,
            [
                (400, 600, Orientation::Portrait),
                (600, 400, Orientation::Landscape),
                (500, 500, Orientation::Portrait),
            ]
        );
    }

    #[test]
    fn test_page_count_matches_elements() {
        let store = store_with(&["https://cdn/1.png", "https://cdn/2.png"]);
        let elements = vec![
            PageElement::new("https://cdn/1.png", 800, 600),
            PageElement::new("https://cdn/2.png", 600, 800),
        ];
        let document = DocumentAssembler::new().assemble(&elements, &store).unwrap();
        assert_eq!(document.page_count(), 2);
    }

    #[test]
    fn test_missing_image_is_capture_mismatch() {
        let store = store_with(&["https://cdn/1.png"]);
        let elements = vec![
            PageElement::new("https://cdn/1.png", 800, 600),
            PageElement::new("https://cdn/2.png", 800, 600),
        ];

        match DocumentAssembler::new().assemble(&elements, &store) {
            Err(CaptureError::CaptureMismatch { url }) => assert_eq!(url, "https://cdn/2.png"),
            other => panic!("expected capture mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_size_element_is_clamped() {
        let store = store_with(&["https://cdn/1.png"]);
        let elements = vec![PageElement::new("https://cdn/1.png", 0, 0)];
        let document = DocumentAssembler::new().assemble(&elements, &store).unwrap();
        assert_eq!((document.pages[0].width, document.pages[0].height), (1, 1));
    }
}
