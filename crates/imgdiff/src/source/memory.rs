use std::cell::Cell;
use std::rc::Rc;

use super::{ImageLevel, ImageSource, SourceError};

/// Levels held in memory, indexed by subimage then MIP level.
pub struct MemorySource {
    name: String,
    subimages: Vec<Vec<ImageLevel>>,
    unreadable: Option<(usize, usize, String)>,
    mislabelled: Option<((usize, usize), (usize, usize))>,
    loads: Rc<Cell<usize>>,
}

impl MemorySource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            subimages: Vec::new(),
            unreadable: None,
            mislabelled: None,
            loads: Rc::new(Cell::new(0)),
        }
    }

    /// Append a subimage; level `i` of `levels` becomes MIP level `i`.
    pub fn with_subimage(mut self, levels: Vec<ImageLevel>) -> Self {
        let subimage = self.subimages.len();
        let levels = levels
            .into_iter()
            .enumerate()
            .map(|(miplevel, level)| level.at(subimage, miplevel))
            .collect();
        self.subimages.push(levels);
        self
    }

    /// Make loading one level fail with `message`.
    pub fn with_unreadable(mut self, subimage: usize, miplevel: usize, message: &str) -> Self {
        self.unreadable = Some((subimage, miplevel, message.to_owned()));
        self
    }

    /// Answer a request for `requested` with a level labelled `label`.
    pub fn with_mislabelled_level(
        mut self,
        subimage: usize,
        miplevel: usize,
        label: (usize, usize),
    ) -> Self {
        self.mislabelled = Some(((subimage, miplevel), label));
        self
    }

    /// Shared counter of `load` calls, readable after the source is boxed.
    pub fn load_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.loads)
    }
}

impl ImageSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn subimage_count(&self) -> usize {
        self.subimages.len().max(1)
    }

    fn miplevel_count(&self, subimage: usize) -> usize {
        self.subimages.get(subimage).map_or(1, |levels| levels.len().max(1))
    }

    fn load(&mut self, subimage: usize, miplevel: usize) -> Result<ImageLevel, SourceError> {
        self.loads.set(self.loads.get() + 1);
        if let Some((s, m, message)) = &self.unreadable
            && (*s, *m) == (subimage, miplevel)
        {
            return Err(SourceError::Backend(message.clone()));
        }
        if let Some((requested, label)) = self.mislabelled
            && requested == (subimage, miplevel)
        {
            let level = ImageLevel::flat(super::ImageShape::new(1, 1, &["Y"]), vec![0.0]);
            return Ok(level.at(label.0, label.1));
        }
        self.subimages
            .get(subimage)
            .and_then(|levels| levels.get(miplevel))
            .cloned()
            .ok_or(SourceError::NoSuchLevel { subimage, miplevel })
    }
}
