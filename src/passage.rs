/// One addressable word of the passage, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassageWordUnit {
    pub index: usize,
    pub text: String,
    pub read: bool,
}

/// Render structure: whitespace separators interleaved with word units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Separator(String),
    Word(usize),
}

/// Owns the passage text and its current render state.
///
/// In the plain state the passage has no addressable units; [`Passage::tokenize`]
/// annotates it and [`Passage::reset`] drops the annotations again.
#[derive(Debug, Clone, Default)]
pub struct Passage {
    text: String,
    segments: Vec<Segment>,
    units: Vec<PassageWordUnit>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            segments: Vec::new(),
            units: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn units(&self) -> &[PassageWordUnit] {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut [PassageWordUnit] {
        &mut self.units
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_annotated(&self) -> bool {
        !self.units.is_empty()
    }

    pub fn read_count(&self) -> usize {
        self.units.iter().filter(|u| u.read).count()
    }

    /// Splits the passage into addressable word units, keeping every whitespace
    /// run as a separator so the original layout can be reproduced exactly.
    /// No-op for an empty passage.
    pub fn tokenize(&mut self) -> &[PassageWordUnit] {
        if self.text.is_empty() {
            return &self.units;
        }

        let mut segments = Vec::new();
        let mut units = Vec::new();
        let mut rest = self.text.as_str();

        while !rest.is_empty() {
            let is_space = rest.starts_with(char::is_whitespace);
            let end = rest
                .find(|c: char| c.is_whitespace() != is_space)
                .unwrap_or(rest.len());
            let (part, tail) = rest.split_at(end);

            if is_space {
                segments.push(Segment::Separator(part.to_owned()));
            } else {
                let index = units.len();
                units.push(PassageWordUnit {
                    index,
                    text: part.to_owned(),
                    read: false,
                });
                segments.push(Segment::Word(index));
            }
            rest = tail;
        }

        self.segments = segments;
        self.units = units;
        &self.units
    }

    /// Restores the plain representation, discarding units and read marks.
    /// No-op for an empty passage.
    pub fn reset(&mut self) {
        if self.text.is_empty() {
            return;
        }
        self.segments.clear();
        self.units.clear();
    }

    /// Replaces the passage text; the render state starts out plain.
    pub fn replace(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.segments.clear();
        self.units.clear();
    }

    /// Reassembles the text from the render structure (or returns the plain
    /// text when not annotated).
    pub fn render_plain(&self) -> String {
        if !self.is_annotated() {
            return self.text.clone();
        }
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Separator(s) => s.as_str(),
                Segment::Word(i) => self.units[*i].text.as_str(),
            })
            .collect()
    }
}
