//! Writing formatter output back into the buffer.
//!
//! All targets of one format action are applied with a single
//! [`TextBuffer::replace`] over the span covering them, so the buffer never
//! holds a mix of old and new text and undo is one step.

use crate::FormatError;
use crate::buffer::{BufferError, TextBuffer, TextRange};
use crate::invoker::InvocationResult;
use crate::scope::ResolvedScope;

/// What [`apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    /// The results were accepted. Always `true` on `Ok`.
    pub applied: bool,
    /// The buffer was modified.
    pub changed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("buffer changed while formatting ({range}); result discarded")]
    Stale { range: TextRange },

    #[error("expected {expected} formatter results, got {got}")]
    ResultCount { expected: usize, got: usize },
}

/// Replace the resolved scope with the formatter results.
///
/// `results` is aligned with `scope.targets`. Any failure leaves the buffer
/// untouched and is returned as the matching [`FormatError`].
pub fn apply(
    buffer: &mut dyn TextBuffer,
    scope: &ResolvedScope,
    results: &[InvocationResult],
) -> Result<ApplyReport, FormatError> {
    if results.len() != scope.targets.len() {
        return Err(ApplyError::ResultCount {
            expected: scope.targets.len(),
            got: results.len(),
        }
        .into());
    }

    let mut outputs = Vec::with_capacity(results.len());
    for result in results {
        match result {
            InvocationResult::Success(text) => outputs.push(text.as_str()),
            InvocationResult::Failure(diagnostic) => return Err(diagnostic.clone().into()),
        }
    }

    ensure_fresh(&*buffer, scope)?;

    let replacements: Vec<String> = scope
        .targets
        .iter()
        .zip(outputs)
        .map(|(target, output)| {
            if scope.is_whole_file() || ends_with_line_break(&target.text) {
                output.to_string()
            } else {
                trim_trailing_line_breaks(output).to_string()
            }
        })
        .collect();

    let unchanged = scope
        .targets
        .iter()
        .zip(&replacements)
        .all(|(target, replacement)| target.text == *replacement);
    if unchanged {
        return Ok(ApplyReport {
            applied: true,
            changed: false,
        });
    }

    let (Some(first), Some(last)) = (scope.targets.first(), scope.targets.last()) else {
        return Ok(ApplyReport {
            applied: true,
            changed: false,
        });
    };
    let covering = TextRange::new(first.range.start, last.range.end);

    let mut combined = String::with_capacity(covering.len());
    let mut cursor = covering.start;
    for (target, replacement) in scope.targets.iter().zip(&replacements) {
        if target.range.start > cursor {
            combined.push_str(&buffer.text(TextRange::new(cursor, target.range.start))?);
        }
        combined.push_str(replacement);
        cursor = target.range.end;
    }

    buffer.replace(covering, &combined)?;
    tracing::debug!(range = %covering, targets = scope.targets.len(), "Applied formatter output");

    Ok(ApplyReport {
        applied: true,
        changed: true,
    })
}

fn ensure_fresh(buffer: &dyn TextBuffer, scope: &ResolvedScope) -> Result<(), FormatError> {
    if buffer.len() != scope.buffer_len {
        return Err(ApplyError::Stale {
            range: TextRange::whole(buffer.len()),
        }
        .into());
    }
    for target in &scope.targets {
        let current = match buffer.text(target.range) {
            Ok(text) => text,
            Err(BufferError::OutOfBounds { .. } | BufferError::NotCharBoundary(_)) => {
                return Err(ApplyError::Stale {
                    range: target.range,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };
        if current != target.text {
            return Err(ApplyError::Stale {
                range: target.range,
            }
            .into());
        }
    }
    Ok(())
}

fn ends_with_line_break(text: &str) -> bool {
    text.ends_with('\n') || text.ends_with('\r')
}

fn trim_trailing_line_breaks(text: &str) -> &str {
    text.trim_end_matches(['\n', '\r'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MemoryBuffer;
    use crate::eligibility::Trigger;
    use crate::invoker::{Diagnostic, DiagnosticKind};
    use crate::scope::resolve;
    use pretty_assertions::assert_eq;

    fn ok(text: &str) -> InvocationResult {
        InvocationResult::Success(text.to_string())
    }

    #[test]
    fn test_whole_file_replaced() {
        let mut buffer = MemoryBuffer::new("var x = 'a'");
        let scope = resolve(&buffer, Trigger::Manual, false).unwrap();
        let report = apply(&mut buffer, &scope, &[ok("var x = \"a\";")]).unwrap();
        assert_eq!(
            report,
            ApplyReport {
                applied: true,
                changed: true
            }
        );
        assert_eq!(buffer.as_str(), "var x = \"a\";");
        assert_eq!(buffer.edit_count(), 1);
    }

    #[test]
    fn test_identical_output_is_noop() {
        let mut buffer = MemoryBuffer::new("var x = 1;\n");
        let scope = resolve(&buffer, Trigger::Manual, false).unwrap();
        let report = apply(&mut buffer, &scope, &[ok("var x = 1;\n")]).unwrap();
        assert!(report.applied);
        assert!(!report.changed);
        assert_eq!(buffer.edit_count(), 0);
    }

    #[test]
    fn test_failure_leaves_buffer_untouched() {
        let mut buffer = MemoryBuffer::new("var x = ;");
        let scope = resolve(&buffer, Trigger::Manual, false).unwrap();
        let failure = InvocationResult::Failure(Diagnostic {
            kind: DiagnosticKind::Process { exit_code: 2 },
            message: "SyntaxError".to_string(),
        });
        let err = apply(&mut buffer, &scope, &[failure]).unwrap_err();
        assert!(matches!(err, FormatError::Process { exit_code: 2, .. }));
        assert_eq!(buffer.as_str(), "var x = ;");
        assert_eq!(buffer.edit_count(), 0);
    }

    #[test]
    fn test_selections_applied_as_one_edit() {
        let source = "a=1\nkeep\nb=2\n";
        let mut buffer = MemoryBuffer::new(source)
            .with_selection(TextRange::new(0, 3))
            .with_selection(TextRange::new(9, 12));
        let scope = resolve(&buffer, Trigger::Manual, true).unwrap();
        let report = apply(&mut buffer, &scope, &[ok("a = 1;\n"), ok("b = 2;\n")]).unwrap();
        assert!(report.changed);
        assert_eq!(buffer.as_str(), "a = 1;\nkeep\nb = 2;\n");
        assert_eq!(buffer.edit_count(), 1);

        assert!(buffer.undo());
        assert_eq!(buffer.as_str(), source);
    }

    #[test]
    fn test_selection_keeps_trailing_newline_when_source_had_one() {
        let mut buffer = MemoryBuffer::new("a=1\nb=2\n").with_selection(TextRange::new(0, 4));
        let scope = resolve(&buffer, Trigger::Manual, true).unwrap();
        apply(&mut buffer, &scope, &[ok("a = 1;\n")]).unwrap();
        assert_eq!(buffer.as_str(), "a = 1;\nb=2\n");
    }

    #[test]
    fn test_one_failed_selection_blocks_all() {
        let mut buffer = MemoryBuffer::new("a=1\nb=2\n")
            .with_selection(TextRange::new(0, 3))
            .with_selection(TextRange::new(4, 7));
        let scope = resolve(&buffer, Trigger::Manual, true).unwrap();
        let failure = InvocationResult::Failure(Diagnostic {
            kind: DiagnosticKind::Timeout(std::time::Duration::from_secs(1)),
            message: "timeout".to_string(),
        });
        let err = apply(&mut buffer, &scope, &[ok("a = 1;"), failure]).unwrap_err();
        assert!(matches!(err, FormatError::Timeout(_)));
        assert_eq!(buffer.as_str(), "a=1\nb=2\n");
    }

    #[test]
    fn test_stale_buffer_is_rejected() {
        let mut buffer = MemoryBuffer::new("var x = 'a'");
        let scope = resolve(&buffer, Trigger::Manual, false).unwrap();
        buffer.replace(TextRange::new(0, 3), "let").unwrap();

        let err = apply(&mut buffer, &scope, &[ok("var x = \"a\";")]).unwrap_err();
        assert!(matches!(err, FormatError::Apply(ApplyError::Stale { .. })));
        assert_eq!(buffer.as_str(), "let x = 'a'");
    }

    #[test]
    fn test_result_count_mismatch() {
        let mut buffer = MemoryBuffer::new("x");
        let scope = resolve(&buffer, Trigger::Manual, false).unwrap();
        let err = apply(&mut buffer, &scope, &[]).unwrap_err();
        assert!(matches!(
            err,
            FormatError::Apply(ApplyError::ResultCount {
                expected: 1,
                got: 0
            })
        ));
    }

    #[test]
    fn test_read_only_buffer() {
        let mut buffer = MemoryBuffer::new("x").read_only();
        let scope = resolve(&buffer, Trigger::Manual, false).unwrap();
        let err = apply(&mut buffer, &scope, &[ok("x;\n")]).unwrap_err();
        assert!(matches!(err, FormatError::Buffer(BufferError::ReadOnly)));
    }
}
