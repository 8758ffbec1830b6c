//! Paragraph/table view over `word/document.xml`.
//!
//! The model is a projection: every run keeps the event indices of its `w:t` elements, so
//! edited run text can be written back into the original event list without touching any
//! other markup (run properties, tabs, drawings, section properties, ...).

use super::xml::{find_attr, XmlEvent, XmlPart};

#[derive(Clone, Debug)]
struct TextSlot {
    elem: usize,
    texts: Vec<usize>,
    self_closing: bool,
}

#[derive(Clone, Debug)]
struct RunLoc {
    start: usize,
    /// `None` for a self-closing `<w:r/>`.
    end: Option<usize>,
    slots: Vec<TextSlot>,
}

/// A formatted run. Only the text is exposed; formatting stays in the XML.
#[derive(Clone, Debug)]
pub struct Run {
    text: String,
    original: String,
    loc: RunLoc,
}

impl Run {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    fn is_dirty(&self) -> bool {
        self.text != self.original
    }
}

#[derive(Clone, Debug)]
struct ParaLoc {
    start: usize,
    /// `None` for a self-closing `<w:p/>`.
    end: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    loc: ParaLoc,
    appended_run: Option<String>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        let mut out = String::new();
        for r in &self.runs {
            out.push_str(&r.text);
        }
        if let Some(extra) = self.appended_run.as_deref() {
            out.push_str(extra);
        }
        out
    }

    /// Puts `text` into the first run and empties the others. Returns `false` (and changes
    /// nothing) when the paragraph has no runs.
    pub fn replace_text(&mut self, text: &str) -> bool {
        let Some((first, rest)) = self.runs.split_first_mut() else {
            return false;
        };
        first.set_text(text);
        for r in rest {
            r.set_text("");
        }
        true
    }

    fn set_text_creating_run(&mut self, text: &str) {
        if !self.replace_text(text) {
            self.appended_run = Some(text.to_string());
        }
    }

    fn clear(&mut self) {
        for r in &mut self.runs {
            r.set_text("");
        }
        self.appended_run = None;
    }
}

/// `w:vMerge` state of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VMerge {
    #[default]
    None,
    Restart,
    /// Covered by the cell above; carries no content of its own.
    Continue,
}

#[derive(Clone, Debug, Default)]
pub struct Cell {
    pub paragraphs: Vec<Paragraph>,
    /// `w:gridSpan`; 0 when absent.
    pub grid_span: usize,
    pub v_merge: VMerge,
}

impl Cell {
    /// Grid columns covered by this cell.
    pub fn span(&self) -> usize {
        self.grid_span.max(1)
    }

    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replaces the whole cell text with `value`: the first paragraph carries the value
    /// (a run is created when it has none), every other paragraph is emptied.
    pub fn set_text(&mut self, value: &str) {
        let Some((first, rest)) = self.paragraphs.split_first_mut() else {
            return;
        };
        first.set_text_creating_run(value);
        for p in rest {
            p.clear();
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub rows: Vec<Row>,
}

/// Cell access is by grid column: a cell with `w:gridSpan` answers for every column it
/// covers, and a `w:vMerge` continuation answers with the cell where the merge starts.
impl Table {
    /// Grid columns covered by the cells of `row`.
    pub fn grid_width(&self, row: usize) -> usize {
        self.rows
            .get(row)
            .map_or(0, |r| r.cells.iter().map(Cell::span).sum())
    }

    /// `(row, cell index)` of the physical cell covering grid column `col` of `row`.
    fn locate(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let cells = &self.rows.get(row)?.cells;
        let mut start = 0;
        for (i, cell) in cells.iter().enumerate() {
            let end = start + cell.span();
            if col < end {
                if cell.v_merge == VMerge::Continue && row > 0 {
                    return self.locate(row - 1, col).or(Some((row, i)));
                }
                return Some((row, i));
            }
            start = end;
        }
        None
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        let (r, i) = self.locate(row, col)?;
        self.rows.get(r).and_then(|row| row.cells.get(i))
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        let (r, i) = self.locate(row, col)?;
        self.rows.get_mut(r).and_then(|row| row.cells.get_mut(i))
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.rows
            .iter_mut()
            .flat_map(|r| r.cells.iter_mut())
            .flat_map(|c| c.paragraphs.iter_mut())
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .flat_map(|c| c.paragraphs.iter())
    }
}

/// Body paragraphs and top-level tables of one document part.
#[derive(Clone, Debug)]
pub struct Document {
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<Table>,
    part: XmlPart,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ParaTarget {
    Body,
    Cell,
}

struct ParaCapture {
    target: ParaTarget,
    p_stack_len: usize,
    start: usize,
    runs: Vec<Run>,
    hyperlink_stack_len: Option<usize>,
    run: Option<(usize, Run)>,
    slot: Option<(usize, TextSlot)>,
}

impl ParaCapture {
    fn new(target: ParaTarget, p_stack_len: usize, start: usize) -> Self {
        Self {
            target,
            p_stack_len,
            start,
            runs: Vec::new(),
            hyperlink_stack_len: None,
            run: None,
            slot: None,
        }
    }

    fn finish(self, end: Option<usize>) -> Paragraph {
        Paragraph {
            runs: self.runs,
            loc: ParaLoc {
                start: self.start,
                end,
            },
            appended_run: None,
        }
    }
}

fn new_run(start: usize, end: Option<usize>) -> Run {
    Run {
        text: String::new(),
        original: String::new(),
        loc: RunLoc {
            start,
            end,
            slots: Vec::new(),
        },
    }
}

fn set_cell_property(table: &mut Option<Table>, name: &str, attrs: &[(String, String)]) {
    let Some(cell) = table
        .as_mut()
        .and_then(|t| t.rows.last_mut())
        .and_then(|r| r.cells.last_mut())
    else {
        return;
    };
    match name {
        "w:gridSpan" => {
            if let Some(n) = find_attr(attrs, "w:val").and_then(|v| v.trim().parse().ok()) {
                cell.grid_span = n;
            }
        }
        "w:vMerge" => {
            cell.v_merge = match find_attr(attrs, "w:val") {
                Some("restart") => VMerge::Restart,
                _ => VMerge::Continue,
            };
        }
        _ => {}
    }
}

/// True for a direct `w:tcPr` child of a top-level table cell.
fn in_cell_props(stack: &[&str], tbl_depth: usize) -> bool {
    tbl_depth == 1 && stack.len() >= 2 && stack[stack.len() - 2..] == ["w:tc", "w:tcPr"]
}

fn push_para(
    para: Paragraph,
    target: ParaTarget,
    paragraphs: &mut Vec<Paragraph>,
    table: &mut Option<Table>,
) {
    match target {
        ParaTarget::Body => paragraphs.push(para),
        ParaTarget::Cell => {
            if let Some(cell) = table
                .as_mut()
                .and_then(|t| t.rows.last_mut())
                .and_then(|r| r.cells.last_mut())
            {
                cell.paragraphs.push(para);
            }
        }
    }
}

impl Document {
    pub fn parse(part: XmlPart) -> Self {
        let mut paragraphs: Vec<Paragraph> = Vec::new();
        let mut tables: Vec<Table> = Vec::new();

        let mut stack: Vec<&str> = Vec::new();
        let mut tbl_depth = 0usize;
        let mut table: Option<Table> = None;
        let mut capturing: Option<ParaCapture> = None;

        for (idx, ev) in part.events.iter().enumerate() {
            match ev {
                XmlEvent::Start { name, attrs } => {
                    let parent = stack.last().copied().unwrap_or("");
                    if in_cell_props(&stack, tbl_depth) {
                        set_cell_property(&mut table, name, attrs);
                    }
                    match name.as_str() {
                        "w:tbl" => {
                            if parent == "w:body" && tbl_depth == 0 {
                                table = Some(Table::default());
                            }
                            tbl_depth += 1;
                        }
                        "w:tr" if tbl_depth == 1 && parent == "w:tbl" => {
                            if let Some(t) = table.as_mut() {
                                t.rows.push(Row::default());
                            }
                        }
                        "w:tc" if tbl_depth == 1 && parent == "w:tr" => {
                            if let Some(r) = table.as_mut().and_then(|t| t.rows.last_mut()) {
                                r.cells.push(Cell::default());
                            }
                        }
                        "w:p" => {
                            if parent == "w:body" && tbl_depth == 0 {
                                capturing =
                                    Some(ParaCapture::new(ParaTarget::Body, stack.len() + 1, idx));
                            } else if parent == "w:tc" && tbl_depth == 1 {
                                capturing =
                                    Some(ParaCapture::new(ParaTarget::Cell, stack.len() + 1, idx));
                            }
                        }
                        _ => {}
                    }

                    if let Some(cap) = capturing.as_mut() {
                        match name.as_str() {
                            "w:hyperlink" if stack.len() == cap.p_stack_len => {
                                cap.hyperlink_stack_len = Some(stack.len() + 1);
                            }
                            "w:r" if cap.run.is_none() => {
                                let direct = stack.len() == cap.p_stack_len;
                                let linked = parent == "w:hyperlink"
                                    && cap.hyperlink_stack_len == Some(stack.len());
                                if direct || linked {
                                    cap.run = Some((stack.len() + 1, new_run(idx, None)));
                                }
                            }
                            "w:t" => {
                                if let Some((r_len, _)) = cap.run.as_ref() {
                                    if *r_len == stack.len() {
                                        cap.slot = Some((
                                            stack.len() + 1,
                                            TextSlot {
                                                elem: idx,
                                                texts: Vec::new(),
                                                self_closing: false,
                                            },
                                        ));
                                    }
                                }
                            }
                            _ => {}
                        }
                    }

                    stack.push(name.as_str());
                }
                XmlEvent::Empty { name, attrs } => {
                    let parent = stack.last().copied().unwrap_or("");
                    if in_cell_props(&stack, tbl_depth) {
                        set_cell_property(&mut table, name, attrs);
                    }
                    if name == "w:p" && capturing.is_none() {
                        let target = if parent == "w:body" && tbl_depth == 0 {
                            Some(ParaTarget::Body)
                        } else if parent == "w:tc" && tbl_depth == 1 {
                            Some(ParaTarget::Cell)
                        } else {
                            None
                        };
                        if let Some(target) = target {
                            let para = ParaCapture::new(target, stack.len() + 1, idx).finish(None);
                            push_para(para, target, &mut paragraphs, &mut table);
                        }
                        continue;
                    }
                    if let Some(cap) = capturing.as_mut() {
                        match name.as_str() {
                            "w:r" if cap.run.is_none() => {
                                let direct = stack.len() == cap.p_stack_len;
                                let linked = parent == "w:hyperlink"
                                    && cap.hyperlink_stack_len == Some(stack.len());
                                if direct || linked {
                                    cap.runs.push(new_run(idx, None));
                                }
                            }
                            "w:t" => {
                                if let Some((r_len, run)) = cap.run.as_mut() {
                                    if *r_len == stack.len() {
                                        run.loc.slots.push(TextSlot {
                                            elem: idx,
                                            texts: Vec::new(),
                                            self_closing: true,
                                        });
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                XmlEvent::Text { text } => {
                    if let Some(cap) = capturing.as_mut() {
                        if let (Some((_, slot)), Some((_, run))) =
                            (cap.slot.as_mut(), cap.run.as_mut())
                        {
                            slot.texts.push(idx);
                            run.text.push_str(text);
                        }
                    }
                }
                XmlEvent::End { name } => {
                    let mut para_closed = false;
                    if let Some(cap) = capturing.as_mut() {
                        match name.as_str() {
                            "w:t" => {
                                if cap.slot.as_ref().map(|(l, _)| *l) == Some(stack.len()) {
                                    if let (Some((_, slot)), Some((_, run))) =
                                        (cap.slot.take(), cap.run.as_mut())
                                    {
                                        run.loc.slots.push(slot);
                                    }
                                }
                            }
                            "w:r" => {
                                if cap.run.as_ref().map(|(l, _)| *l) == Some(stack.len()) {
                                    if let Some((_, mut run)) = cap.run.take() {
                                        run.loc.end = Some(idx);
                                        run.original = run.text.clone();
                                        cap.runs.push(run);
                                    }
                                }
                            }
                            "w:hyperlink" => {
                                if cap.hyperlink_stack_len == Some(stack.len()) {
                                    cap.hyperlink_stack_len = None;
                                }
                            }
                            "w:p" => para_closed = cap.p_stack_len == stack.len(),
                            _ => {}
                        }
                    }
                    if para_closed {
                        if let Some(cap) = capturing.take() {
                            let target = cap.target;
                            push_para(cap.finish(Some(idx)), target, &mut paragraphs, &mut table);
                        }
                    }

                    if name == "w:tbl" && tbl_depth > 0 {
                        tbl_depth -= 1;
                        if tbl_depth == 0 {
                            if let Some(t) = table.take() {
                                tables.push(t);
                            }
                        }
                    }
                    let _ = stack.pop();
                }
                _ => {}
            }
        }

        Self {
            paragraphs,
            tables,
            part,
        }
    }

    /// All paragraphs: body first, then every cell paragraph of every table.
    pub fn all_paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.paragraphs
            .iter()
            .chain(self.tables.iter().flat_map(Table::paragraphs))
    }

    /// Writes edited run text back into the event list and returns the part.
    pub fn into_part(self) -> XmlPart {
        let Self {
            paragraphs,
            tables,
            mut part,
        } = self;

        let mut edits = Edits::default();
        let all = paragraphs
            .iter()
            .chain(tables.iter().flat_map(Table::paragraphs));
        for p in all {
            for r in p.runs.iter().filter(|r| r.is_dirty()) {
                edits.run_text(r);
            }
            if let Some(text) = p.appended_run.as_deref() {
                edits.append_run(&part, &p.loc, text);
            }
        }
        edits.apply(&mut part);
        part
    }
}

#[derive(Default)]
struct Edits {
    texts: Vec<(usize, String)>,
    preserve: Vec<usize>,
    splices: Vec<(usize, usize, Vec<XmlEvent>)>,
}

fn needs_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

fn wt_events(text: &str) -> Vec<XmlEvent> {
    vec![
        XmlEvent::start("w:t", &[("xml:space", "preserve")]),
        XmlEvent::text(text),
        XmlEvent::end("w:t"),
    ]
}

impl Edits {
    fn run_text(&mut self, run: &Run) {
        let loc = &run.loc;
        let Some((first, rest)) = loc.slots.split_first() else {
            if run.text.is_empty() {
                return;
            }
            match loc.end {
                Some(end) => self.splices.push((end, 0, wt_events(&run.text))),
                None => {
                    let mut evs = vec![XmlEvent::start("w:r", &[])];
                    evs.extend(wt_events(&run.text));
                    evs.push(XmlEvent::end("w:r"));
                    self.splices.push((loc.start, 1, evs));
                }
            }
            return;
        };

        if first.self_closing {
            if !run.text.is_empty() {
                self.splices.push((first.elem, 1, wt_events(&run.text)));
            }
        } else if let Some((t0, t_rest)) = first.texts.split_first() {
            self.texts.push((*t0, run.text.clone()));
            for t in t_rest {
                self.texts.push((*t, String::new()));
            }
            if needs_preserve(&run.text) {
                self.preserve.push(first.elem);
            }
        } else if !run.text.is_empty() {
            self.splices
                .push((first.elem + 1, 0, vec![XmlEvent::text(&run.text)]));
            if needs_preserve(&run.text) {
                self.preserve.push(first.elem);
            }
        }

        for slot in rest {
            for t in &slot.texts {
                self.texts.push((*t, String::new()));
            }
        }
    }

    fn append_run(&mut self, part: &XmlPart, loc: &ParaLoc, text: &str) {
        let mut run = vec![XmlEvent::start("w:r", &[])];
        run.extend(wt_events(text));
        run.push(XmlEvent::end("w:r"));
        match loc.end {
            Some(end) => self.splices.push((end, 0, run)),
            None => {
                let attrs = match part.events.get(loc.start) {
                    Some(XmlEvent::Empty { attrs, .. }) => attrs.clone(),
                    _ => Vec::new(),
                };
                let mut evs = vec![XmlEvent::Start {
                    name: "w:p".to_string(),
                    attrs,
                }];
                evs.extend(run);
                evs.push(XmlEvent::end("w:p"));
                self.splices.push((loc.start, 1, evs));
            }
        }
    }

    fn apply(mut self, part: &mut XmlPart) {
        for (idx, text) in self.texts {
            if let Some(XmlEvent::Text { text: t }) = part.events.get_mut(idx) {
                *t = text;
            }
        }
        for idx in self.preserve {
            if let Some(XmlEvent::Start { attrs, .. }) = part.events.get_mut(idx) {
                if super::xml::find_attr(attrs, "xml:space") != Some("preserve") {
                    super::xml::set_attr(attrs, "xml:space", "preserve");
                }
            }
        }
        // Back to front so earlier indices stay valid.
        self.splices.sort_by(|a, b| b.0.cmp(&a.0));
        for (at, remove, insert) in self.splices {
            part.events.splice(at..at + remove, insert);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::testutil::{cell_xml, document, para_xml, table_xml};
    use crate::docx::xml::write_xml_part;

    fn xml_of(doc: Document) -> String {
        String::from_utf8(write_xml_part(&doc.into_part()).expect("write")).expect("utf8")
    }

    #[test]
    fn body_paragraphs_and_tables_are_projected() {
        let body = format!(
            "{}{}{}",
            para_xml(&["Name: <Vor", "name>"]),
            table_xml(&[&["", "Montag"], &["Arbeitszeit", "8-16"]]),
            para_xml(&["Ende"]),
        );
        let doc = document(&body);
        assert_eq!(doc.paragraphs.len(), 2);
        assert_eq!(doc.paragraphs[0].text(), "Name: <Vorname>");
        assert_eq!(doc.paragraphs[0].runs.len(), 2);
        assert_eq!(doc.paragraphs[1].text(), "Ende");
        assert_eq!(doc.tables.len(), 1);
        let t = &doc.tables[0];
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.cell(0, 1).map(Cell::text).as_deref(), Some("Montag"));
        assert_eq!(t.cell(1, 0).map(Cell::text).as_deref(), Some("Arbeitszeit"));
        assert_eq!(doc.all_paragraphs().count(), 6);
    }

    #[test]
    fn hyperlink_runs_count_as_paragraph_text() {
        let body = r#"<w:p><w:r><w:t xml:space="preserve">Siehe </w:t></w:r><w:hyperlink r:id="rId9"><w:r><w:t>Richtlinie</w:t></w:r></w:hyperlink></w:p>"#;
        let doc = document(body);
        assert_eq!(doc.paragraphs[0].text(), "Siehe Richtlinie");
        assert_eq!(doc.paragraphs[0].runs.len(), 2);
    }

    #[test]
    fn nested_tables_are_not_projected() {
        let inner = table_xml(&[&["innen"]]);
        let body = format!(
            "<w:tbl><w:tr>{}<w:tc>{}<w:p/></w:tc></w:tr></w:tbl>",
            cell_xml("aussen"),
            inner
        );
        let doc = document(&body);
        assert_eq!(doc.tables.len(), 1);
        let row = &doc.tables[0].rows[0];
        assert_eq!(row.cells.len(), 2);
        assert_eq!(row.cells[1].text(), "");
    }

    #[test]
    fn untouched_document_round_trips_verbatim() {
        let body = format!(
            "{}{}",
            para_xml(&["A ", "<B>"]),
            table_xml(&[&["x", "y"]])
        );
        let doc = document(&body);
        let before = String::from_utf8(write_xml_part(&doc.part).expect("w")).expect("utf8");
        assert_eq!(xml_of(doc), before);
    }

    #[test]
    fn replace_text_merges_into_first_run_and_keeps_its_formatting() {
        let body = r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Name: </w:t></w:r><w:r><w:t>&lt;X&gt;</w:t></w:r></w:p>"#;
        let mut doc = document(body);
        assert!(doc.paragraphs[0].replace_text(" Name: Max"));
        let xml = xml_of(doc);
        assert!(xml.contains(r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve"> Name: Max</w:t></w:r>"#));
        assert!(xml.contains("<w:r><w:t></w:t></w:r>"));
    }

    #[test]
    fn replace_text_without_runs_is_a_no_op() {
        let mut doc = document("<w:p><w:pPr/></w:p>");
        assert!(!doc.paragraphs[0].replace_text("x"));
        assert_eq!(doc.paragraphs[0].text(), "");
    }

    #[test]
    fn cell_set_text_creates_a_run_in_an_empty_cell() {
        let body = "<w:tbl><w:tr><w:tc><w:p/></w:tc><w:tc><w:p><w:pPr/></w:p><w:p><w:r><w:t>alt</w:t></w:r></w:p></w:tc></w:tr></w:tbl>";
        let mut doc = document(body);
        let t = &mut doc.tables[0];
        t.cell_mut(0, 0).expect("cell").set_text("8-16");
        t.cell_mut(0, 1).expect("cell").set_text("frei");
        assert_eq!(t.cell(0, 0).map(Cell::text).as_deref(), Some("8-16"));
        assert_eq!(t.cell(0, 1).map(Cell::text).as_deref(), Some("frei\n"));

        let xml = xml_of(doc);
        assert!(xml.contains(r#"<w:tc><w:p><w:r><w:t xml:space="preserve">8-16</w:t></w:r></w:p></w:tc>"#));
        assert!(xml.contains(r#"<w:p><w:pPr/><w:r><w:t xml:space="preserve">frei</w:t></w:r></w:p><w:p><w:r><w:t></w:t></w:r></w:p>"#));
    }

    #[test]
    fn run_without_text_element_gets_one() {
        let body = "<w:p><w:r><w:tab/></w:r><w:r><w:t/></w:r></w:p>";
        let mut doc = document(body);
        doc.paragraphs[0].runs[0].set_text("A");
        doc.paragraphs[0].runs[1].set_text("B");
        let xml = xml_of(doc);
        assert!(xml.contains(r#"<w:r><w:tab/><w:t xml:space="preserve">A</w:t></w:r>"#));
        assert!(xml.contains(r#"<w:r><w:t xml:space="preserve">B</w:t></w:r>"#));
    }

    #[test]
    fn cells_are_addressed_by_grid_column() {
        let body = r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>c</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:tcPr><w:tcW w:w="2000"/><w:gridSpan w:val="2"/><w:vMerge w:val="restart"/></w:tcPr><w:p><w:r><w:t>ab</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>c2</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:tcPr><w:gridSpan w:val="2"/><w:vMerge/></w:tcPr><w:p/></w:tc><w:tc><w:p><w:r><w:t>c3</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;
        let doc = document(body);
        let t = &doc.tables[0];
        assert_eq!(t.rows[1].cells[0].span(), 2);
        assert_eq!(t.rows[1].cells[0].v_merge, VMerge::Restart);
        assert_eq!(t.rows[2].cells[0].v_merge, VMerge::Continue);
        assert_eq!(t.grid_width(0), 3);
        assert_eq!(t.grid_width(1), 3);
        let text = |r, c| t.cell(r, c).map(Cell::text);
        assert_eq!(text(1, 0).as_deref(), Some("ab"));
        assert_eq!(text(1, 1).as_deref(), Some("ab"));
        assert_eq!(text(1, 2).as_deref(), Some("c2"));
        assert_eq!(text(2, 1).as_deref(), Some("ab"));
        assert_eq!(text(2, 2).as_deref(), Some("c3"));
        assert!(t.cell(1, 3).is_none());
        assert_eq!(t.paragraphs().count(), 7);
    }
}
