use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::{fs, io};

use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;

const THEME: &str = "base16-ocean.dark";

/// Read-through cache of source files with terminal syntax highlighting.
///
/// Hardware-simulation sources come in several languages (Python kratos
/// generators, SystemVerilog, ...), the syntax is picked by extension with
/// a plain-text fallback.
pub struct FileView {
    cached_lines: Mutex<HashMap<PathBuf, Box<[String]>>>,
}

impl FileView {
    pub fn new() -> Self {
        Self {
            cached_lines: Mutex::new(HashMap::new()),
        }
    }

    /// Render `2 * bounds + 1` highlighted lines around `line_num`
    /// (1-based), with line numbers in the gutter.
    pub fn render_around(
        &self,
        file_path: &Path,
        line_num: u64,
        bounds: u64,
    ) -> anyhow::Result<String> {
        let line_num = line_num.max(1);
        let start = (line_num - 1).saturating_sub(bounds);
        self.render(file_path, start, bounds * 2 + 1, line_num)
    }

    fn render(
        &self,
        file_path: &Path,
        start: u64,
        length: u64,
        mark_line: u64,
    ) -> anyhow::Result<String> {
        let mut cache = self.cached_lines.lock().unwrap();
        let file_lines = match cache.get(file_path) {
            None => {
                let file = fs::File::open(file_path)?;
                let lines = io::BufReader::new(file)
                    .lines()
                    .map_while(Result::ok)
                    .collect::<Vec<_>>();
                cache.insert(file_path.to_path_buf(), lines.into_boxed_slice());
                cache.get(file_path).unwrap()
            }
            Some(lines) => lines,
        };

        let syntaxes = syntax_set();
        let syntax = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| syntaxes.find_syntax_by_extension(ext));
        let mut highlighter =
            syntax.map(|syntax| HighlightLines::new(syntax, &theme_set().themes[THEME]));

        let mut result = String::new();
        for (i, line) in file_lines
            .iter()
            .enumerate()
            .skip(start as usize)
            .take(length as usize)
        {
            let line_number = i as u64 + 1;
            let marker = if line_number == mark_line { ">" } else { " " };

            match &mut highlighter {
                Some(h) => {
                    let segments = h.highlight_line(line, syntaxes)?;
                    let escaped = as_24_bit_terminal_escaped(&segments, false);
                    result.push_str(&format!("{marker}{line_number:>4} {escaped}\x1b[0m\n"));
                }
                None => {
                    result.push_str(&format!("{marker}{line_number:>4} {line}\n"));
                }
            }
        }

        Ok(result)
    }
}

impl Default for FileView {
    fn default() -> Self {
        Self::new()
    }
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    static THEMES: OnceLock<ThemeSet> = OnceLock::new();
    THEMES.get_or_init(ThemeSet::load_defaults)
}
