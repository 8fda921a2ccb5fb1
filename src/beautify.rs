//! Line-oriented re-indentation of rendered HTML and the scripts inside it.
//!
//! Only leading indentation changes, plus `()` becoming `( )` in script code.
//! Lines are never split or joined, and any line that starts inside a tag,
//! an HTML comment, `<pre>`/`<textarea>` content or a script string/comment
//! is left untouched. Running the formatter on its own output is a no-op.

const INDENT: [char; 2] = [' ', '\t'];

/// Characters after which a `/` in script code opens a regex literal.
const REGEX_PRECEDERS: &str = "(,=:[!&|?{};+-*%<>~^";

const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeautifyOptions {
    pub indent_size: usize,
    pub space_in_empty_paren: bool,
}

impl Default for BeautifyOptions {
    fn default() -> Self {
        Self { indent_size: 4, space_in_empty_paren: true }
    }
}

pub fn beautify(html: &str) -> String {
    beautify_with(html, &BeautifyOptions::default())
}

pub fn beautify_with(html: &str, options: &BeautifyOptions) -> String {
    let mut formatter = Formatter::new(options);
    html.split('\n')
        .map(|line| formatter.line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawText {
    Script,
    Style,
}

impl RawText {
    fn end_tag(self) -> &'static str {
        match self {
            RawText::Script => "</script",
            RawText::Style => "</style",
        }
    }

    fn name(self) -> &'static str {
        &self.end_tag()[2..]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Code {
    Plain,
    Str(char),
    Regex { in_class: bool },
    LineComment,
    BlockComment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Markup,
    Tag { name: String, closing: bool, quote: Option<char> },
    Comment,
    Declaration,
    Raw { element: RawText, code: Code },
    Verbatim { end_tag: String },
}

struct Formatter<'a> {
    options: &'a BeautifyOptions,
    mode: Mode,
    depth: usize,
    code_depth: usize,
    last_code: Option<char>,
    word: String,
}

fn starts_with_ci(chars: &[char], pattern: &str) -> bool {
    let mut rest = chars.iter();
    pattern
        .chars()
        .all(|p| rest.next().is_some_and(|c| c.to_ascii_lowercase() == p))
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn tag_name_end(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while end < chars.len() && (chars[end].is_ascii_alphanumeric() || matches!(chars[end], '-' | ':' | '_')) {
        end += 1;
    }
    end
}

impl<'a> Formatter<'a> {

    fn new(options: &'a BeautifyOptions) -> Self {
        Self {
            options,
            mode: Mode::Markup,
            depth: 0,
            code_depth: 0,
            last_code: None,
            word: String::new(),
        }
    }

    fn level(&self) -> usize {
        self.depth + self.code_depth
    }

    fn preserves_line(&self) -> bool {
        !matches!(
            self.mode,
            Mode::Markup | Mode::Raw { code: Code::Plain, .. }
        )
    }

    fn line(&mut self, line: &str) -> String {

        let preserve = self.preserves_line();
        let content = if preserve { line } else { line.trim_start_matches(INDENT) };
        let chars: Vec<char> = content.chars().collect();

        let mut min_level = self.level();
        let mut out = String::with_capacity(content.len());
        let mut i = 0;

        while i < chars.len() {
            i = self.step(&chars, i, &mut out);
            min_level = min_level.min(self.level());
        }

        self.end_of_line(content);

        if preserve {
            return out;
        }
        if out.is_empty() || out == "\r" {
            return out;
        }

        let mut indented = " ".repeat(min_level * self.options.indent_size);
        indented.push_str(&out);
        indented
    }

    /// Consumes one token starting at `i` and returns the next position.
    fn step(&mut self, chars: &[char], i: usize, out: &mut String) -> usize {

        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match &mut self.mode {
            Mode::Markup => {
                if c != '<' {
                    out.push(c);
                    return i + 1;
                }
                if starts_with_ci(&chars[i..], "<!--") {
                    out.push_str("<!--");
                    self.mode = Mode::Comment;
                    return i + 4;
                }
                match next {
                    Some('!') | Some('?') => {
                        self.mode = Mode::Declaration;
                        out.push(c);
                        i + 1
                    }
                    Some('/') if chars.get(i + 2).is_some_and(|n| n.is_ascii_alphabetic()) => {
                        self.open_tag(chars, i + 2, true, out)
                    }
                    Some(n) if n.is_ascii_alphabetic() => self.open_tag(chars, i + 1, false, out),
                    _ => {
                        out.push(c);
                        i + 1
                    }
                }
            }
            Mode::Tag { name, closing, quote } => {
                out.push(c);
                let open_quote = *quote;
                match open_quote {
                    Some(q) => {
                        if c == q {
                            *quote = None;
                        }
                    }
                    None if c == '"' || c == '\'' => *quote = Some(c),
                    None if c == '>' => {
                        let name = std::mem::take(name);
                        let closing = *closing;
                        let self_closing = i > 0 && chars[i - 1] == '/';
                        self.finish_tag(&name, closing, self_closing);
                    }
                    None => {}
                }
                i + 1
            }
            Mode::Comment => {
                if starts_with_ci(&chars[i..], "-->") {
                    out.push_str("-->");
                    self.mode = Mode::Markup;
                    return i + 3;
                }
                out.push(c);
                i + 1
            }
            Mode::Declaration => {
                out.push(c);
                if c == '>' {
                    self.mode = Mode::Markup;
                }
                i + 1
            }
            Mode::Verbatim { end_tag } => {
                if starts_with_ci(&chars[i..], end_tag) {
                    return self.open_tag(chars, i + 2, true, out);
                }
                out.push(c);
                i + 1
            }
            Mode::Raw { element, code } => {
                let element = *element;
                if starts_with_ci(&chars[i..], element.end_tag()) {
                    self.code_depth = 0;
                    return self.open_tag(chars, i + 2, true, out);
                }
                let state = *code;
                match state {
                    Code::Plain => self.step_code(element, chars, i, out),
                    Code::Str(q) => {
                        out.push(c);
                        if c == '\\' {
                            if let Some(escaped) = next {
                                out.push(escaped);
                                return i + 2;
                            }
                        } else if c == q {
                            *code = Code::Plain;
                            self.last_code = Some(q);
                            self.word.clear();
                        }
                        i + 1
                    }
                    Code::Regex { in_class } => {
                        out.push(c);
                        match c {
                            '\\' => {
                                if let Some(escaped) = next {
                                    out.push(escaped);
                                    return i + 2;
                                }
                            }
                            '[' => *code = Code::Regex { in_class: true },
                            ']' => *code = Code::Regex { in_class: false },
                            '/' if !in_class => {
                                *code = Code::Plain;
                                self.last_code = Some('/');
                                self.word.clear();
                            }
                            _ => {}
                        }
                        i + 1
                    }
                    Code::LineComment => {
                        out.push(c);
                        i + 1
                    }
                    Code::BlockComment => {
                        if c == '*' && next == Some('/') {
                            out.push_str("*/");
                            *code = Code::Plain;
                            return i + 2;
                        }
                        out.push(c);
                        i + 1
                    }
                }
            }
        }
    }

    fn step_code(&mut self, element: RawText, chars: &[char], i: usize, out: &mut String) -> usize {

        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let mut code = Code::Plain;
        let mut advance = 1;

        match c {
            '"' | '\'' | '`' => code = Code::Str(c),
            '/' if next == Some('/') => {
                code = Code::LineComment;
                advance = 2;
            }
            '/' if next == Some('*') => {
                code = Code::BlockComment;
                advance = 2;
            }
            '/' if element == RawText::Script && self.regex_allowed() => code = Code::Regex { in_class: false },
            '(' if next == Some(')')
                && element == RawText::Script
                && self.options.space_in_empty_paren =>
            {
                out.push_str("( )");
                self.last_code = Some(')');
                self.word.clear();
                return i + 2;
            }
            '{' | '[' | '(' => self.code_depth += 1,
            '}' | ']' | ')' => self.code_depth = self.code_depth.saturating_sub(1),
            _ => {}
        }

        if code == Code::Plain && !c.is_whitespace() {
            if is_ident(c) {
                let continues_word = i > 0 && is_ident(chars[i - 1]) && self.last_code.is_some_and(is_ident);
                if !continues_word {
                    self.word.clear();
                }
                self.word.push(c);
            } else {
                self.word.clear();
            }
            self.last_code = Some(c);
        }

        out.extend(&chars[i..i + advance]);
        self.mode = Mode::Raw { element, code };
        i + advance
    }

    fn regex_allowed(&self) -> bool {
        match self.last_code {
            None => true,
            Some(p) if REGEX_PRECEDERS.contains(p) => true,
            Some(p) if is_ident(p) => REGEX_KEYWORDS.contains(&self.word.as_str()),
            Some(_) => false,
        }
    }

    fn open_tag(&mut self, chars: &[char], name_start: usize, closing: bool, out: &mut String) -> usize {
        let end = tag_name_end(chars, name_start);
        let name: String = chars[name_start..end].iter().collect();
        out.push_str(if closing { "</" } else { "<" });
        out.push_str(&name);
        self.mode = Mode::Tag { name: name.to_ascii_lowercase(), closing, quote: None };
        end
    }

    fn finish_tag(&mut self, name: &str, closing: bool, self_closing: bool) {

        self.mode = Mode::Markup;

        if closing {
            self.depth = self.depth.saturating_sub(1);
            return;
        }
        if self_closing || VOID_ELEMENTS.contains(&name) {
            return;
        }

        self.depth += 1;
        self.last_code = None;
        self.word.clear();
        self.mode = match name {
            "script" => Mode::Raw { element: RawText::Script, code: Code::Plain },
            "style" => Mode::Raw { element: RawText::Style, code: Code::Plain },
            "pre" | "textarea" => Mode::Verbatim { end_tag: format!("</{}", name) },
            _ => Mode::Markup,
        };
    }

    fn end_of_line(&mut self, content: &str) {
        if let Mode::Raw { element, code } = self.mode {
            let ends_line = match code {
                Code::LineComment => true,
                Code::Str(q) => q != '`' && !content.trim_end_matches('\r').ends_with('\\'),
                Code::Regex { .. } => true,
                _ => false,
            };
            if ends_line {
                tracing::trace!(element = element.name(), "code state reset at end of line");
                self.mode = Mode::Raw { element, code: Code::Plain };
            }
        }
    }
}
