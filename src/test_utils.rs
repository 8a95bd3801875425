pub mod test_helpers {
    use image::Rgba;

    use crate::pdf::{
        DocumentOpener, DocumentSource, PageHandle, PageSize, RasterImage, SourceError,
    };

    /// Distinct opaque color for page `index`, never white
    #[must_use]
    pub fn page_color(index: usize) -> Rgba<u8> {
        let r = (index * 37 % 200) as u8;
        let g = (100 + index * 11 % 100) as u8;
        Rgba([r, g, 50, 0xFF])
    }

    /// In-memory document whose pages are flat colors.
    ///
    /// Each page paints [`page_color`] over every row except the last, so
    /// tests can see both the page content and the background under it.
    #[derive(Clone, Debug)]
    pub struct SolidPageSource {
        sizes: Vec<PageSize>,
        failing: Vec<usize>,
        title: Option<String>,
    }

    impl SolidPageSource {
        /// `count` pages of `width`×`height`
        #[must_use]
        pub fn uniform(count: usize, width: u32, height: u32) -> Self {
            Self {
                sizes: vec![PageSize::new(width, height); count],
                failing: vec![],
                title: None,
            }
        }

        #[must_use]
        pub fn with_page_size(mut self, index: usize, width: u32, height: u32) -> Self {
            self.sizes[index] = PageSize::new(width, height);
            self
        }

        /// Rasterizing page `index` reports an error
        #[must_use]
        pub fn failing_on(mut self, index: usize) -> Self {
            self.failing.push(index);
            self
        }

        #[must_use]
        pub fn with_title(mut self, title: &str) -> Self {
            self.title = Some(title.to_string());
            self
        }
    }

    impl DocumentSource for SolidPageSource {
        fn page_count(&self) -> usize {
            self.sizes.len()
        }

        fn open_page(&self, index: usize) -> Result<Box<dyn PageHandle + '_>, SourceError> {
            let size = *self.sizes.get(index).ok_or(SourceError::OutOfRange {
                index,
                page_count: self.sizes.len(),
            })?;
            Ok(Box::new(SolidPage {
                index,
                size,
                fails: self.failing.contains(&index),
            }))
        }

        fn title(&self) -> Option<String> {
            self.title.clone()
        }
    }

    struct SolidPage {
        index: usize,
        size: PageSize,
        fails: bool,
    }

    impl PageHandle for SolidPage {
        fn size(&self) -> PageSize {
            self.size
        }

        fn render_into(&self, target: &mut RasterImage) -> Result<(), SourceError> {
            if self.fails {
                return Err(SourceError::Render(format!(
                    "page {} is damaged",
                    self.index
                )));
            }

            let color = page_color(self.index);
            let rows = target.height().saturating_sub(1);
            let img = target.as_rgba_mut();
            for y in 0..rows {
                for x in 0..img.width() {
                    img.put_pixel(x, y, color);
                }
            }
            Ok(())
        }
    }

    /// Opener handing a [`SolidPageSource`] to the render worker
    #[derive(Clone, Debug)]
    pub struct SolidOpener {
        source: SolidPageSource,
        fail_open: bool,
    }

    impl SolidOpener {
        #[must_use]
        pub fn new(source: SolidPageSource) -> Self {
            Self {
                source,
                fail_open: false,
            }
        }

        #[must_use]
        pub fn uniform(count: usize, width: u32, height: u32) -> Self {
            Self::new(SolidPageSource::uniform(count, width, height))
        }

        #[must_use]
        pub fn failing_on(self, index: usize) -> Self {
            Self::new(self.source.failing_on(index))
        }

        /// Opening reports an error, as for a corrupt or missing file
        #[must_use]
        pub fn failing_open(mut self) -> Self {
            self.fail_open = true;
            self
        }
    }

    impl DocumentOpener for SolidOpener {
        fn open(&self) -> Result<Box<dyn DocumentSource>, SourceError> {
            if self.fail_open {
                return Err(SourceError::Open("not a document".into()));
            }
            Ok(Box::new(self.source.clone()))
        }

        fn describe(&self) -> String {
            format!("solid document ({} pages)", self.source.page_count())
        }
    }
}
