use std::fs;

//A whitespace token scanner with line tracking for the control deck
//and the auxiliary property files.  Comment text from '#' to the end
//of a line is dropped.  Every error names the file and the line of
//the offending record.

pub struct TokenScanner {
    pub filename: String,
    tokens: Vec<(String, usize)>, //token, 1-based line number
    pos: usize,
}

impl TokenScanner {
    pub fn open(filename: &str) -> Result<TokenScanner, String> {
        let content = fs::read_to_string(filename)
            .map_err(|_| format!("Can't open file: {}", filename))?;
        Ok(TokenScanner::from_content(filename, &content))
    }

    pub fn from_content(filename: &str, content: &str) -> TokenScanner {
        let mut tokens = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = match line.find('#') {
                Some(p) => &line[..p],
                None => line,
            };
            for token in line.split_whitespace() {
                tokens.push((token.to_string(), i + 1));
            }
        }
        TokenScanner {
            filename: filename.to_string(),
            tokens,
            pos: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Line number of the most recently consumed token
    pub fn line(&self) -> usize {
        if self.pos == 0 {
            1
        } else {
            self.tokens[self.pos - 1].1
        }
    }

    /// Look at the next token without consuming it
    pub fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(|(t, _)| t.as_str())
    }

    pub fn next_str(&mut self, what: &str) -> Result<String, String> {
        match self.tokens.get(self.pos) {
            Some((t, _)) => {
                self.pos += 1;
                Ok(t.clone())
            }
            None => Err(format!(
                "File '{}': unexpected end of file, expected {}",
                self.filename, what
            )),
        }
    }

    pub fn next_f64(&mut self, what: &str) -> Result<f64, String> {
        let t = self.next_str(what)?;
        t.parse().map_err(|_| {
            format!(
                "File '{}' line {}: bad {} value '{}'",
                self.filename,
                self.line(),
                what,
                t
            )
        })
    }

    pub fn next_usize(&mut self, what: &str) -> Result<usize, String> {
        let t = self.next_str(what)?;
        t.parse().map_err(|_| {
            format!(
                "File '{}' line {}: bad {} value '{}'",
                self.filename,
                self.line(),
                what,
                t
            )
        })
    }

    pub fn next_i32(&mut self, what: &str) -> Result<i32, String> {
        let t = self.next_str(what)?;
        t.parse().map_err(|_| {
            format!(
                "File '{}' line {}: bad {} value '{}'",
                self.filename,
                self.line(),
                what,
                t
            )
        })
    }

    /// Consume a token that must match a keyword (case-insensitive)
    pub fn expect(&mut self, keyword: &str) -> Result<(), String> {
        let t = self.next_str(keyword)?;
        if t.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(format!(
                "File '{}' line {}: expected '{}' but found '{}'",
                self.filename,
                self.line(),
                keyword,
                t
            ))
        }
    }

    /// Format an error at the current position
    pub fn error(&self, msg: &str) -> String {
        format!("File '{}' line {}: {}", self.filename, self.line(), msg)
    }
}
