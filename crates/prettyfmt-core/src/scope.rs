//! Scope resolution: which text a format action targets.

use crate::buffer::{BufferError, TextBuffer, TextRange};
use crate::eligibility::Trigger;

/// The span kind targeted by one format action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    WholeFile,
    /// Disjoint selections, sorted by position.
    Selections(Vec<TextRange>),
}

/// One independently formatted span and its text at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub range: TextRange,
    pub text: String,
}

impl Target {
    /// Empty or whitespace-only targets are not sent to the formatter.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// The resolved scope together with the text it covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub scope: Scope,
    pub targets: Vec<Target>,
    /// Buffer length at resolution time, used to detect concurrent edits.
    pub buffer_len: usize,
}

impl ResolvedScope {
    pub fn is_whole_file(&self) -> bool {
        matches!(self.scope, Scope::WholeFile)
    }

    /// Whether every target is blank.
    pub fn is_blank(&self) -> bool {
        self.targets.iter().all(Target::is_blank)
    }
}

/// Resolve the scope of a format action.
///
/// Save-triggered actions always format the whole buffer. Manual actions
/// format the non-empty selections when inline formatting is allowed and
/// there are any, else the whole buffer.
pub fn resolve(
    buffer: &dyn TextBuffer,
    trigger: Trigger,
    allow_inline_formatting: bool,
) -> Result<ResolvedScope, BufferError> {
    let buffer_len = buffer.len();

    let selections = match trigger {
        Trigger::Save => Vec::new(),
        Trigger::Manual if allow_inline_formatting => coalesce(buffer.selections()),
        Trigger::Manual => Vec::new(),
    };

    if selections.is_empty() {
        let range = TextRange::whole(buffer_len);
        return Ok(ResolvedScope {
            scope: Scope::WholeFile,
            targets: vec![Target {
                range,
                text: buffer.text(range)?,
            }],
            buffer_len,
        });
    }

    let targets = selections
        .iter()
        .map(|&range| {
            Ok(Target {
                range,
                text: buffer.text(range)?,
            })
        })
        .collect::<Result<Vec<_>, BufferError>>()?;

    Ok(ResolvedScope {
        scope: Scope::Selections(selections),
        targets,
        buffer_len,
    })
}

/// Drop empty selections, sort, and merge overlapping ones. Selections that
/// only meet at an endpoint stay separate targets.
fn coalesce(mut selections: Vec<TextRange>) -> Vec<TextRange> {
    selections.retain(|r| !r.is_empty());
    selections.sort();

    let mut merged: Vec<TextRange> = Vec::with_capacity(selections.len());
    for range in selections {
        match merged.last_mut() {
            Some(last) if last.overlaps(&range) => *last = last.cover(&range),
            _ => merged.push(range),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MemoryBuffer;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "const a = 1;\nconst b = 2;\nconst c = 3;\n";

    #[test]
    fn test_no_selection_is_whole_file() {
        let buffer = MemoryBuffer::new(SOURCE);
        let resolved = resolve(&buffer, Trigger::Manual, true).unwrap();
        assert!(resolved.is_whole_file());
        assert_eq!(resolved.targets.len(), 1);
        assert_eq!(resolved.targets[0].text, SOURCE);
        assert_eq!(resolved.buffer_len, SOURCE.len());
    }

    #[test]
    fn test_selections_with_inline_formatting() {
        let buffer = MemoryBuffer::new(SOURCE)
            .with_selection(TextRange::new(26, 39))
            .with_selection(TextRange::new(0, 12));
        let resolved = resolve(&buffer, Trigger::Manual, true).unwrap();

        assert_eq!(
            resolved.scope,
            Scope::Selections(vec![TextRange::new(0, 12), TextRange::new(26, 39)])
        );
        assert_eq!(resolved.targets[0].text, "const a = 1;");
        assert_eq!(resolved.targets[1].text, "const c = 3;\n");
    }

    #[test]
    fn test_selections_ignored_without_inline_formatting() {
        let buffer = MemoryBuffer::new(SOURCE).with_selection(TextRange::new(0, 12));
        let resolved = resolve(&buffer, Trigger::Manual, false).unwrap();
        assert!(resolved.is_whole_file());
    }

    #[test]
    fn test_save_forces_whole_file() {
        let buffer = MemoryBuffer::new(SOURCE).with_selection(TextRange::new(0, 12));
        let resolved = resolve(&buffer, Trigger::Save, true).unwrap();
        assert!(resolved.is_whole_file());
        assert_eq!(resolved.targets[0].range, TextRange::whole(SOURCE.len()));
    }

    #[test]
    fn test_zero_width_selection_counts_as_none() {
        let buffer = MemoryBuffer::new(SOURCE)
            .with_selection(TextRange::new(5, 5))
            .with_selection(TextRange::new(20, 20));
        let resolved = resolve(&buffer, Trigger::Manual, true).unwrap();
        assert!(resolved.is_whole_file());
    }

    #[test]
    fn test_overlapping_selections_are_merged() {
        let buffer = MemoryBuffer::new(SOURCE)
            .with_selection(TextRange::new(0, 8))
            .with_selection(TextRange::new(5, 12))
            .with_selection(TextRange::new(8, 10));
        let resolved = resolve(&buffer, Trigger::Manual, true).unwrap();
        assert_eq!(resolved.scope, Scope::Selections(vec![TextRange::new(0, 12)]));
    }

    #[test]
    fn test_adjacent_selections_stay_separate() {
        let buffer = MemoryBuffer::new(SOURCE)
            .with_selection(TextRange::new(13, 26))
            .with_selection(TextRange::new(0, 13));
        let resolved = resolve(&buffer, Trigger::Manual, true).unwrap();
        assert_eq!(
            resolved.scope,
            Scope::Selections(vec![TextRange::new(0, 13), TextRange::new(13, 26)])
        );
        assert_eq!(resolved.targets[0].text, "const a = 1;\n");
        assert_eq!(resolved.targets[1].text, "const b = 2;\n");
    }

    #[test]
    fn test_blank_targets() {
        let buffer = MemoryBuffer::new("  \n\t\n");
        let resolved = resolve(&buffer, Trigger::Manual, false).unwrap();
        assert!(resolved.is_blank());

        let buffer = MemoryBuffer::new(SOURCE);
        let resolved = resolve(&buffer, Trigger::Manual, false).unwrap();
        assert!(!resolved.is_blank());
    }

    #[test]
    fn test_out_of_bounds_selection_is_an_error() {
        let buffer = MemoryBuffer::new("abc").with_selection(TextRange::new(1, 10));
        assert!(resolve(&buffer, Trigger::Manual, true).is_err());
    }
}
