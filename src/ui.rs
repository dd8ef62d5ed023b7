use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::capture::CaptureState;
use crate::model::WordStatus;
use crate::passage::{Passage, Segment};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

const LEGEND: &str =
    "(r)ecord / (s)top / (p)lay passage / (f)eedback audio / (n)ew passage / (esc)ape";

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let passage = self.controller().passage();
        let feedback = self.feedback();

        let inner_width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let passage_lines = passage_height(passage.text(), inner_width);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(1),             // title
                    Constraint::Length(1),             // padding
                    Constraint::Length(passage_lines), // passage
                    Constraint::Length(1),             // padding
                    Constraint::Length(1),             // status
                    Constraint::Min(0),                // feedback
                    Constraint::Length(1),             // legend
                ]
                .as_ref(),
            )
            .split(area);

        Paragraph::new(Span::styled(title_for(self), bold_style))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        Paragraph::new(passage_lines_for(passage))
            .wrap(Wrap { trim: false })
            .render(chunks[2], buf);

        let status_style = match self.state() {
            CaptureState::Recording => Style::default().fg(Color::Red).patch(bold_style),
            CaptureState::Processing => Style::default().fg(Color::Yellow).patch(bold_style),
            CaptureState::Idle => Style::default().fg(Color::Cyan),
        };
        Paragraph::new(Span::styled(feedback.status.clone(), status_style))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);

        if feedback.has_results() || !feedback.transcript.is_empty() {
            render_feedback(self, chunks[5], buf);
        }

        Paragraph::new(Span::styled(LEGEND, italic_style)).render(chunks[6], buf);
    }
}

fn title_for(app: &App) -> String {
    let ctx = app.context();
    let assignment = ctx.assignment_id.map(|id| format!("assignment {}", id));
    let title = [ctx.title.clone(), assignment].into_iter().flatten().join(" · ");
    if title.is_empty() {
        "Read aloud".to_string()
    } else {
        title
    }
}

/// Rows the passage needs at `width` once word-wrapped, counting explicit
/// line breaks.
fn passage_height(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = text.split('\n').map(|line| wrapped_rows(line, width)).sum();
    u16::try_from(rows.max(1)).unwrap_or(u16::MAX)
}

/// Greedy word wrap: words move to the next row when they do not fit, and
/// words wider than a row are broken across rows.
fn wrapped_rows(line: &str, width: usize) -> usize {
    let mut rows = 1;
    let mut col = 0;
    for word in line.split(' ') {
        let w = word.width();
        let needed = if col == 0 { w } else { col + 1 + w };
        if needed <= width {
            col = needed;
        } else if w <= width {
            rows += 1;
            col = w;
        } else {
            if col > 0 {
                rows += 1;
            }
            rows += (w - 1) / width;
            col = match w % width {
                0 => width,
                rest => rest,
            };
        }
    }
    rows
}

/// Read words green, unread words dimmed; plain text before the first attempt.
fn passage_lines_for(passage: &Passage) -> Vec<Line<'_>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let read_style = Style::default().patch(bold_style).fg(Color::Green);
    let unread_style = Style::default().patch(bold_style).add_modifier(Modifier::DIM);

    if !passage.is_annotated() {
        return passage
            .text()
            .split('\n')
            .map(|l| Line::from(Span::styled(l, bold_style)))
            .collect();
    }

    let mut lines = Vec::new();
    let mut current: Vec<Span> = Vec::new();
    for segment in passage.segments() {
        match segment {
            Segment::Word(i) => {
                let unit = &passage.units()[*i];
                let style = if unit.read { read_style } else { unread_style };
                current.push(Span::styled(unit.text.as_str(), style));
            }
            Segment::Separator(sep) => {
                let mut parts = sep.split('\n');
                if let Some(first) = parts.next() {
                    current.push(Span::raw(first));
                }
                for part in parts {
                    lines.push(Line::from(std::mem::take(&mut current)));
                    current.push(Span::raw(part));
                }
            }
        }
    }
    lines.push(Line::from(current));
    lines
}

fn render_feedback(app: &App, area: Rect, buf: &mut Buffer) {
    let feedback = app.feedback();
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let heading = |s: &'static str| Line::from(Span::styled(s, bold_style.fg(Color::Magenta)));

    let word_spans: Vec<Span> = feedback
        .words()
        .iter()
        .flat_map(|w| {
            let style = match w.status {
                WordStatus::Correct => Style::default().fg(Color::Green),
                WordStatus::Misread => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                WordStatus::Other(_) => Style::default().fg(Color::Yellow),
            };
            [Span::styled(w.word.clone(), style), Span::raw(" ")]
        })
        .collect();

    let mut lines = vec![
        Line::from(vec![
            Span::styled("You read: ", bold_style),
            Span::raw(feedback.transcript.clone()),
        ]),
        Line::from(Span::styled(feedback.accuracy_line(), bold_style)),
        Line::from(word_spans),
        Line::default(),
        heading("Encouragement"),
        Line::from(feedback.encouragement_line()),
        heading("Tips"),
    ];
    lines.extend(feedback.tip_lines().into_iter().map(Line::from));
    lines.push(heading("Questions"));
    lines.extend(feedback.question_lines().into_iter().map(Line::from));

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::TOP).title("Feedback"))
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::idle_app;
    use crate::model::{CoachingResult, EvaluationResult, Tip, WordFeedback};
    use crate::pipeline::PipelineUpdate;

    fn rendered(app: &App, area: Rect) -> String {
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_ui_shows_passage_and_legend() {
        let (app, _rt) = idle_app("the cat sat");
        let out = rendered(&app, Rect::new(0, 0, 100, 24));
        assert!(out.contains("the cat sat"));
        assert!(out.contains("(r)ecord"));
        assert!(out.contains("Read aloud"));
    }

    #[test]
    fn test_read_words_are_highlighted() {
        let mut passage = Passage::new("one two");
        passage.tokenize();
        passage.units_mut()[0].read = true;

        let lines = passage_lines_for(&passage);
        let spans = &lines[0].spans;
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].style.fg, Some(Color::Green));
        assert!(spans[2].style.add_modifier.contains(Modifier::DIM));
    }

    #[test]
    fn test_title_defaults_without_context() {
        let (app, _rt) = idle_app("hello");
        assert_eq!(title_for(&app), "Read aloud");
    }

    #[test]
    fn test_ui_renders_feedback_panels() {
        let (mut app, _rt) = idle_app("the quick brown fox jumps");
        let view = app.feedback_mut();
        view.apply(&PipelineUpdate::Transcribed("the quick brown fox".into()));
        view.apply(&PipelineUpdate::Evaluated(EvaluationResult {
            accuracy: 80.0,
            words: vec![WordFeedback {
                word: "jumps".into(),
                status: WordStatus::Misread,
            }],
        }));
        view.apply(&PipelineUpdate::Coached(CoachingResult {
            encouragement: None,
            tips: Some(vec![Tip {
                word: "jumps".into(),
                tip: "Say jum-ps".into(),
            }]),
            questions: Some(vec![]),
        }));

        let out = rendered(&app, Rect::new(0, 0, 100, 30));
        assert!(out.contains("Accuracy: 80%"));
        assert!(out.contains("jumps: Say jum-ps"));
        assert!(out.contains("No feedback available."));
        assert!(out.contains("No questions available."));
    }

    #[test]
    fn test_ui_small_area_does_not_panic() {
        let (app, _rt) = idle_app("hello");
        let out = rendered(&app, Rect::new(0, 0, 8, 3));
        assert!(!out.is_empty());
    }

    #[test]
    fn test_passage_height() {
        assert_eq!(passage_height("", 10), 1);
        assert_eq!(passage_height("0123456789ab", 10), 2);
        assert_eq!(passage_height("one\ntwo", 10), 2);
        assert_eq!(passage_height("aaa bbb ccc", 6), 3);
        assert_eq!(passage_height("abcdefghijkl", 5), 3);
        assert_eq!(passage_height("one two", 0), 6);
    }

    #[test]
    fn test_passage_lines_keep_layout() {
        let mut passage = Passage::new("one two\nthree");
        passage.tokenize();
        let lines = passage_lines_for(&passage);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].to_string(), "one two");
        assert_eq!(lines[1].to_string(), "three");
    }
}
