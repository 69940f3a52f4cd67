//! A small moustache-style template engine (`.tpl`).
//!
//! ```text
//! {{ title }}                      field of the current item or the context
//! {{ document.parent.url }}        dotted paths walk objects
//! {{#each site.documents}}…{{/each}}  `this` and `@index` inside the loop
//! {{#if paginator.pagination}}…{{else}}…{{/if}}
//! {{#unless draft}}…{{/unless}}
//! {{> nav}}                        content of the document with Id `nav`
//! {{! comment }}
//! ```
//!
//! Values are inserted verbatim. Inside `#each`, names are looked up on the
//! loop item first, then on enclosing items, then on the context.
//!
//! Templates are parsed once per path and cached until unloaded, or until
//! the same path is rendered with different text.

use super::context::{Context, Value};
use super::engine::{RenderError, Renderer, SourceDescriptor};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(String),
    Partial(String),
    Each {
        path: String,
        body: Vec<Node>,
    },
    If {
        path: String,
        negate: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Root,
    Each(String),
    If { path: String, negate: bool },
}

impl Block {
    fn closing_name(&self) -> &'static str {
        match self {
            Block::Root => "",
            Block::Each(_) => "each",
            Block::If { negate: false, .. } => "if",
            Block::If { negate: true, .. } => "unless",
        }
    }
}

struct Frame {
    block: Block,
    nodes: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl Frame {
    fn new(block: Block) -> Self {
        Self {
            block,
            nodes: Vec::new(),
            otherwise: None,
        }
    }

    fn push(&mut self, node: Node) {
        match &mut self.otherwise {
            Some(nodes) => nodes.push(node),
            None => self.nodes.push(node),
        }
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut stack = vec![Frame::new(Block::Root)];
        let mut rest = text;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                current(&mut stack).push(Node::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| "unclosed '{{'".to_string())?;
            let tag = after[..end].trim();
            rest = &after[end + 2..];

            if tag.starts_with('!') {
                continue;
            } else if let Some(path) = tag.strip_prefix("#each") {
                stack.push(Frame::new(Block::Each(argument(path, "#each")?)));
            } else if let Some(path) = tag.strip_prefix("#if") {
                stack.push(Frame::new(Block::If {
                    path: argument(path, "#if")?,
                    negate: false,
                }));
            } else if let Some(path) = tag.strip_prefix("#unless") {
                stack.push(Frame::new(Block::If {
                    path: argument(path, "#unless")?,
                    negate: true,
                }));
            } else if tag == "else" {
                let frame = current(&mut stack);
                if !matches!(frame.block, Block::If { .. }) || frame.otherwise.is_some() {
                    return Err("'else' outside of an if block".to_string());
                }
                frame.otherwise = Some(Vec::new());
            } else if let Some(name) = tag.strip_prefix('/') {
                let name = name.trim();
                let frame = match stack.pop() {
                    Some(frame) if frame.block != Block::Root => frame,
                    _ => return Err(format!("unexpected '{{{{/{name}}}}}'")),
                };
                if frame.block.closing_name() != name {
                    return Err(format!(
                        "'{{{{/{name}}}}}' closes a '{}' block",
                        frame.block.closing_name()
                    ));
                }
                let node = match frame.block {
                    Block::Each(path) => Node::Each {
                        path,
                        body: frame.nodes,
                    },
                    Block::If { path, negate } => Node::If {
                        path,
                        negate,
                        then: frame.nodes,
                        otherwise: frame.otherwise.unwrap_or_default(),
                    },
                    Block::Root => unreachable!("root frame is never popped"),
                };
                current(&mut stack).push(node);
            } else if let Some(id) = tag.strip_prefix('>') {
                current(&mut stack).push(Node::Partial(argument(id, ">")?));
            } else if tag.is_empty() {
                return Err("empty '{{}}' tag".to_string());
            } else {
                current(&mut stack).push(Node::Var(tag.to_string()));
            }
        }
        if !rest.is_empty() {
            current(&mut stack).push(Node::Text(rest.to_string()));
        }

        match stack.pop() {
            Some(frame) if stack.is_empty() => Ok(Self { nodes: frame.nodes }),
            Some(frame) => Err(format!(
                "unclosed '{{{{#{}}}}}' block",
                frame.block.closing_name()
            )),
            None => Err("template stack underflow".to_string()),
        }
    }

    /// Render against `context`.
    pub fn render(&self, context: &Context<'_>) -> String {
        let mut out = String::new();
        let mut locals = Vec::new();
        render_nodes(&self.nodes, context, &mut locals, &mut out);
        out
    }
}

fn current(stack: &mut [Frame]) -> &mut Frame {
    // The root frame is only removed at the very end.
    let last = stack.len() - 1;
    &mut stack[last]
}

fn argument(raw: &str, tag: &str) -> Result<String, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(format!("'{tag}' needs an argument"));
    }
    Ok(value.to_string())
}

/// One `#each` iteration.
struct Local<'a> {
    this: Value<'a>,
    index: usize,
}

fn resolve<'a>(path: &str, context: &Context<'a>, locals: &[Local<'a>]) -> Value<'a> {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let start = match first {
        "this" => locals.last().map(|l| l.this.clone()),
        "@index" => locals.last().map(|l| Value::Int(l.index as i64)),
        _ => locals
            .iter()
            .rev()
            .find_map(|l| l.this.get(first))
            .or_else(|| context.get(first)),
    };
    segments.fold(start.unwrap_or(Value::Null), |value, segment| {
        value.get(segment).unwrap_or(Value::Null)
    })
}

fn render_nodes<'a>(
    nodes: &[Node],
    context: &Context<'a>,
    locals: &mut Vec<Local<'a>>,
    out: &mut String,
) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(path) => out.push_str(&resolve(path, context, locals).to_text()),
            Node::Partial(id) => {
                if let Some(content) = context.partial(id) {
                    out.push_str(&content);
                }
            }
            Node::Each { path, body } => {
                let Value::List(items) = resolve(path, context, locals) else {
                    continue;
                };
                for (index, this) in items.into_iter().enumerate() {
                    locals.push(Local { this, index });
                    render_nodes(body, context, locals, out);
                    locals.pop();
                }
            }
            Node::If {
                path,
                negate,
                then,
                otherwise,
            } => {
                let truthy = resolve(path, context, locals).is_truthy() != *negate;
                render_nodes(if truthy { then } else { otherwise }, context, locals, out);
            }
        }
    }
}

/// Caches parsed templates by source path.
#[derive(Default)]
pub struct TemplateRenderer {
    cache: Mutex<HashMap<PathBuf, (String, Arc<Template>)>>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn compiled(&self, source: &SourceDescriptor<'_>, text: &str) -> Result<Arc<Template>, RenderError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_text, template)) = cache.get(source.path)
            && cached_text == text
        {
            return Ok(Arc::clone(template));
        }
        let template = Arc::new(Template::parse(text).map_err(|message| RenderError::Template {
            path: source.path.to_path_buf(),
            message,
        })?);
        cache.insert(source.path.to_path_buf(), (text.to_string(), Arc::clone(&template)));
        Ok(template)
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Renderer for TemplateRenderer {
    fn extensions(&self) -> &[&'static str] {
        &["tpl"]
    }

    fn render(
        &self,
        source: &SourceDescriptor<'_>,
        template: &str,
        context: &Context<'_>,
    ) -> Result<Option<String>, RenderError> {
        // Parsing holds the lock; rendering may recurse into partials.
        let compiled = self.compiled(source, template)?;
        Ok(Some(compiled.render(context)))
    }

    fn unload(&self, paths: &[PathBuf]) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        for path in paths {
            cache.remove(path);
        }
    }
}
