//! Tree cleaning service
//!
//! Rewrites a parsed LaTeX document tree into a shape the DocBook renderer can
//! emit: math becomes phrases or MathML equations, bare quote content gets a
//! paragraph, block content leaves paragraphs, index-only paragraphs are merged
//! away, figures lose their paragraph wrapper and labels lose their colons.
//!
//! Two passes run in a fixed order, each a post-order walk applying its rules
//! to every node. The repair pass relies on the paragraphs the structure pass
//! has settled.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn, Level};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{
    has_mathml, import_formula, is_simple, parse_document, sanitize_label, write_document,
    Document, DomainError, NodeId, NodeKind, Tag,
};
use crate::infrastructure::traits::{FileSystem, MathTranslator};
use crate::util::error_chain;

/// Attribute holding a node's cross-reference label.
pub const LABEL_ATTR: &str = "label";

/// What a cleaning run did.
///
/// `contains_mml` tells the renderer whether the output needs the MathML
/// namespace declarations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub contains_mml: bool,
    pub math_simplified: usize,
    pub math_translated: usize,
    pub math_failed: usize,
    pub quotes_wrapped: usize,
    pub pars_unpacked: usize,
    pub index_repaired: usize,
    pub figures_unwrapped: usize,
    pub labels_sanitized: usize,
}

impl CleanReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: &CleanReport) {
        self.contains_mml |= other.contains_mml;
        self.math_simplified += other.math_simplified;
        self.math_translated += other.math_translated;
        self.math_failed += other.math_failed;
        self.quotes_wrapped += other.quotes_wrapped;
        self.pars_unpacked += other.pars_unpacked;
        self.index_repaired += other.index_repaired;
        self.figures_unwrapped += other.figures_unwrapped;
        self.labels_sanitized += other.labels_sanitized;
    }

    /// Total number of rewrites.
    pub fn changes(&self) -> usize {
        self.math_simplified
            + self.math_translated
            + self.math_failed
            + self.quotes_wrapped
            + self.pars_unpacked
            + self.index_repaired
            + self.figures_unwrapped
            + self.labels_sanitized
    }
}

impl fmt::Display for CleanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "math: {} simplified, {} translated, {} failed; quotes wrapped: {}; \
             paragraphs unpacked: {}; index terms repaired: {}; figures unwrapped: {}; \
             labels sanitized: {}",
            self.math_simplified,
            self.math_translated,
            self.math_failed,
            self.quotes_wrapped,
            self.pars_unpacked,
            self.index_repaired,
            self.figures_unwrapped,
            self.labels_sanitized
        )
    }
}

/// A full post-order walk with its own rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Math normalization, quote wrapping, paragraph legality
    Structure,
    /// Index-term repair, figure unwrapping, label sanitization
    Repair,
}

impl Pass {
    /// Passes in execution order.
    pub const ORDER: [Pass; 2] = [Pass::Structure, Pass::Repair];

    /// Rules applied to each node, in order.
    pub fn rules(self) -> &'static [Rule] {
        match self {
            Pass::Structure => &[Rule::Math, Rule::Quote, Rule::Paragraph],
            Pass::Repair => &[Rule::IndexTerm, Rule::Figure, Rule::Label],
        }
    }
}

/// Single structural rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Math,
    Quote,
    Paragraph,
    IndexTerm,
    Figure,
    Label,
}

/// Effect of a rule on the visited node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Unchanged,
    Changed,
    /// The node is gone; no further rule may look at it
    Replaced,
}

/// Service cleaning document trees.
pub struct CleanerService {
    translator: Arc<dyn MathTranslator>,
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl CleanerService {
    /// Create a new cleaner service.
    pub fn new(
        translator: Arc<dyn MathTranslator>,
        fs: Arc<dyn FileSystem>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            translator,
            fs,
            settings,
        }
    }

    /// Run both passes over the document.
    ///
    /// Writes the before/after dumps when a dump directory is configured.
    #[instrument(level = "debug", skip_all)]
    pub fn clean(&self, doc: &mut Document) -> ApplicationResult<CleanReport> {
        self.dump(doc, self.settings.dump.before_path(), false)?;

        let mut report = CleanReport::default();
        for pass in Pass::ORDER {
            self.run_pass(doc, pass, &mut report)?;
        }

        self.dump(doc, self.settings.dump.after_path(), report.contains_mml)?;
        info!("cleaned document: {}", report);
        Ok(report)
    }

    /// Parse, clean and serialize an XML document tree.
    pub fn clean_xml(&self, xml: &str) -> ApplicationResult<(String, CleanReport)> {
        let mut doc = parse_document(xml)?;
        let report = self.clean(&mut doc)?;
        let output = write_document(&doc, report.contains_mml || has_mathml(&doc))?;
        Ok((output, report))
    }

    /// Run a single pass over the whole document.
    pub fn run_pass(
        &self,
        doc: &mut Document,
        pass: Pass,
        report: &mut CleanReport,
    ) -> ApplicationResult<()> {
        debug!("pass {:?}", pass);
        let root = doc.root();
        self.walk(doc, root, pass, report)
    }

    fn walk(
        &self,
        doc: &mut Document,
        id: NodeId,
        pass: Pass,
        report: &mut CleanReport,
    ) -> ApplicationResult<()> {
        for child in doc.children(id).to_vec() {
            // earlier siblings may have merged it away
            if doc.contains(child) {
                self.walk(doc, child, pass, report)?;
            }
        }
        for &rule in pass.rules() {
            if self.apply(rule, doc, id, report)? == Outcome::Replaced {
                break;
            }
        }
        Ok(())
    }

    fn apply(
        &self,
        rule: Rule,
        doc: &mut Document,
        id: NodeId,
        report: &mut CleanReport,
    ) -> ApplicationResult<Outcome> {
        match rule {
            Rule::Math => self.test_math(doc, id, report),
            Rule::Quote => test_quote(doc, id, report),
            Rule::Paragraph => test_par(doc, id, report),
            Rule::IndexTerm => test_index(doc, id, report),
            Rule::Figure => test_figure(doc, id, report),
            Rule::Label => test_label(doc, id, report),
        }
    }

    /// Replace math containers by a plain phrase or a translated equation.
    fn test_math(
        &self,
        doc: &mut Document,
        id: NodeId,
        report: &mut CleanReport,
    ) -> ApplicationResult<Outcome> {
        let node = doc.node(id)?;
        let tag = match &node.kind {
            NodeKind::Element(tag) if tag.is_math() => tag.clone(),
            NodeKind::Element(_) | NodeKind::Text(_) | NodeKind::Symbol { .. } => {
                return Ok(Outcome::Unchanged)
            }
        };
        if node.parent().is_none() {
            return Ok(Outcome::Unchanged);
        }
        if tracing::enabled!(Level::TRACE) {
            trace!("math before:\n{}", doc.to_termtree(id));
        }

        let replacement = if is_simple(doc, id) {
            report.math_simplified += 1;
            phrase(doc, id)?
        } else {
            match self.translate(doc, id, &tag) {
                Ok(equation) => {
                    report.math_translated += 1;
                    report.contains_mml = true;
                    equation
                }
                Err(e) if e.is_local_to_math() => {
                    warn!("keeping {} as plain phrase: {}", tag, error_chain(&e));
                    report.math_failed += 1;
                    phrase(doc, id)?
                }
                Err(e) => return Err(e),
            }
        };
        doc.replace(id, &[replacement])?;

        if tracing::enabled!(Level::TRACE) {
            trace!("math after:\n{}", doc.to_termtree(replacement));
        }
        Ok(Outcome::Replaced)
    }

    /// Build the detached equation node for a math container.
    fn translate(&self, doc: &mut Document, id: NodeId, tag: &Tag) -> ApplicationResult<NodeId> {
        let source = doc
            .node(id)?
            .source
            .clone()
            .ok_or_else(|| DomainError::MissingSource(tag.to_string()))?;
        let formula = self
            .translator
            .translate(&source)
            .map_err(|e| ApplicationError::Translation {
                latex: source.clone(),
                source: e,
            })?;
        let math = import_formula(doc, &formula)?;
        let wrapper = doc.create_element(tag.equation_wrapper().unwrap_or(Tag::InformalEquation));
        doc.append(wrapper, math)?;
        Ok(wrapper)
    }

    fn dump(&self, doc: &Document, path: Option<PathBuf>, contains_mml: bool) -> ApplicationResult<()> {
        let Some(path) = path else {
            return Ok(());
        };
        let xml = write_document(doc, contains_mml || has_mathml(doc))?;
        self.fs
            .ensure_parent(&path)
            .with_path_context("create dump directory", &path)?;
        self.fs
            .write(&path, &xml)
            .with_path_context("write dump", &path)?;
        debug!("dumped tree to {}", path.display());
        Ok(())
    }
}

/// Detached `mathit` node that takes over the children of `id`.
fn phrase(doc: &mut Document, id: NodeId) -> ApplicationResult<NodeId> {
    let phrase = doc.create_element(Tag::MathIt);
    doc.append_children(phrase, id)?;
    Ok(phrase)
}

/// Wrap bare quote content in a single paragraph.
fn test_quote(doc: &mut Document, id: NodeId, report: &mut CleanReport) -> ApplicationResult<Outcome> {
    match &doc.node(id)?.kind {
        NodeKind::Element(tag) if tag.is_quote_like() => {}
        NodeKind::Element(_) | NodeKind::Text(_) | NodeKind::Symbol { .. } => {
            return Ok(Outcome::Unchanged)
        }
    }
    let Some(first) = doc.first_child(id) else {
        return Ok(Outcome::Unchanged);
    };
    if doc.node(first)?.is_element(&Tag::Par) {
        return Ok(Outcome::Unchanged);
    }

    let par = doc.create_element(Tag::Par);
    doc.append_children(par, id)?;
    doc.append(id, par)?;
    report.quotes_wrapped += 1;
    Ok(Outcome::Changed)
}

/// Dissolve paragraphs that open with block-level content.
fn test_par(doc: &mut Document, id: NodeId, report: &mut CleanReport) -> ApplicationResult<Outcome> {
    let node = doc.node(id)?;
    if !node.is_element(&Tag::Par) || node.parent().is_none() {
        return Ok(Outcome::Unchanged);
    }
    let Some(first) = doc.first_child(id) else {
        return Ok(Outcome::Unchanged);
    };
    let tag = match &doc.node(first)?.kind {
        NodeKind::Text(_) => return Ok(Outcome::Unchanged),
        NodeKind::Element(tag) | NodeKind::Symbol { tag, .. } => tag.clone(),
    };
    if !tag.is_block() {
        trace!("allowing embedded {}", tag);
        return Ok(Outcome::Unchanged);
    }
    debug!("unpacking paragraph opening with {}", tag);
    doc.unpack(id)?;
    report.pars_unpacked += 1;
    Ok(Outcome::Replaced)
}

/// A paragraph with some real prose in it.
fn is_legitimate(doc: &Document, id: NodeId) -> bool {
    let Some(node) = doc.get(id) else {
        return false;
    };
    node.is_element(&Tag::Par)
        && node.children().iter().any(|&c| {
            doc.get(c)
                .and_then(|child| child.text())
                .map(|text| !text.trim().is_empty())
                .unwrap_or(false)
        })
}

/// Merge index-only paragraphs into a neighbour, or flatten them.
fn test_index(doc: &mut Document, id: NodeId, report: &mut CleanReport) -> ApplicationResult<Outcome> {
    let node = doc.node(id)?;
    if !node.is_element(&Tag::Par) || node.parent().is_none() {
        return Ok(Outcome::Unchanged);
    }
    let has_index = node
        .children()
        .iter()
        .any(|&c| doc.get(c).map(|n| n.is_element(&Tag::Index)).unwrap_or(false));
    if !has_index || is_legitimate(doc, id) {
        return Ok(Outcome::Unchanged);
    }

    if let Some(next) = doc.next_sibling(id)?.filter(|&n| is_legitimate(doc, n)) {
        warn!("moving floating index terms into the following paragraph");
        doc.prepend_children(next, id)?;
        doc.remove_subtree(id)?;
    } else if let Some(prev) = doc.previous_sibling(id)?.filter(|&p| is_legitimate(doc, p)) {
        warn!("moving floating index terms into the preceding paragraph");
        doc.append_children(prev, id)?;
        doc.remove_subtree(id)?;
    } else {
        warn!("no paragraph to hold floating index terms, hoisting them");
        doc.unpack(id)?;
    }
    report.index_repaired += 1;
    Ok(Outcome::Replaced)
}

/// Figures hold their content directly, not inside a paragraph.
fn test_figure(doc: &mut Document, id: NodeId, report: &mut CleanReport) -> ApplicationResult<Outcome> {
    if !doc.node(id)?.is_element(&Tag::Figure) {
        return Ok(Outcome::Unchanged);
    }
    let Some(first) = doc.first_child(id) else {
        return Ok(Outcome::Unchanged);
    };
    if !doc.node(first)?.is_element(&Tag::Par) {
        return Ok(Outcome::Unchanged);
    }
    doc.unpack(first)?;
    report.figures_unwrapped += 1;
    Ok(Outcome::Changed)
}

/// Replace colons in labels, which the output identifiers cannot hold.
fn test_label(doc: &mut Document, id: NodeId, report: &mut CleanReport) -> ApplicationResult<Outcome> {
    let Some(label) = doc.node(id)?.attribute(LABEL_ATTR) else {
        return Ok(Outcome::Unchanged);
    };
    if !label.contains(':') {
        return Ok(Outcome::Unchanged);
    }
    let label = label.to_string();
    let sanitized = sanitize_label(&label).into_owned();
    warn!("label {:?} contains ':', using {:?}", label, sanitized);

    let node = doc.node_mut(id)?;
    node.set_attribute(LABEL_ATTR, sanitized.clone());
    node.source = Some(sanitized);
    report.labels_sanitized += 1;
    Ok(Outcome::Changed)
}
