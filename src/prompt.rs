use crate::helpers::{validate_filename, validate_url, InputError, Quality};
use std::io::{BufRead, Write};

/// Validated answers needed to start a capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub url: String,
    pub filename: String,
    pub quality: Quality,
}

/// Answers already known from the command line
#[derive(Debug, Clone, Default)]
pub struct Prefilled {
    pub url: Option<String>,
    pub filename: Option<String>,
    pub quality: Option<String>,
}

/// Line-based interactive prompts that re-ask until the answer is valid
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Collect URL, filename and quality, prompting only for missing ones.
    ///
    /// Pre-filled values are validated too; an invalid one is an error
    /// rather than a prompt.
    pub fn collect(&mut self, prefilled: Prefilled) -> Result<CaptureRequest, InputError> {
        let url = match prefilled.url {
            Some(url) => validate_url(&url).map(|_| url.trim().to_string())?,
            None => self.ask_url()?,
        };
        let filename = match prefilled.filename {
            Some(name) => validate_filename(&name)?,
            None => self.ask_filename()?,
        };
        let quality = match prefilled.quality {
            Some(q) => q.parse()?,
            None => self.ask_quality()?,
        };
        Ok(CaptureRequest {
            url,
            filename,
            quality,
        })
    }

    pub fn ask_url(&mut self) -> Result<String, InputError> {
        self.ask("Enter a link to comics", |answer| {
            validate_url(answer).map(|_| answer.trim().to_string())
        })
    }

    pub fn ask_filename(&mut self) -> Result<String, InputError> {
        self.ask("Enter a filename for pdf", validate_filename)
    }

    pub fn ask_quality(&mut self) -> Result<Quality, InputError> {
        let message = format!(
            "Pick quality [1] {} [2] {}",
            Quality::Low.title(),
            Quality::High.title()
        );
        self.ask(&message, |answer| answer.parse())
    }

    fn ask<T>(
        &mut self,
        message: &str,
        validate: impl Fn(&str) -> Result<T, InputError>,
    ) -> Result<T, InputError> {
        loop {
            write!(self.output, "? {} › ", message).map_err(io_err)?;
            self.output.flush().map_err(io_err)?;

            let mut line = String::new();
            if self.input.read_line(&mut line).map_err(io_err)? == 0 {
                return Err(InputError::Closed);
            }
            let answer = line.trim_end_matches(['\r', '\n']);

            match validate(answer) {
                Ok(value) => return Ok(value),
                Err(e) => writeln!(self.output, "  {}", e).map_err(io_err)?,
            }
        }
    }
}

fn io_err(e: std::io::Error) -> InputError {
    InputError::Io(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_collect_all_answers() {
        let mut p = prompter("https://example.com/c/1\nissue-1\n2\n");
        let request = p.collect(Prefilled::default()).unwrap();

        assert_eq!(
            request,
            CaptureRequest {
                url: "https://example.com/c/1".to_string(),
                filename: "issue-1".to_string(),
                quality: Quality::High,
            }
        );
    }

    #[test]
    fn test_reprompts_on_invalid_answers() {
        let mut p = prompter("nope\nhttps://example.com/c/1\n\nissue\nultra\nlow\n");
        let request = p.collect(Prefilled::default()).unwrap();
        assert_eq!(request.filename, "issue");
        assert_eq!(request.quality, Quality::Low);

        let transcript = String::from_utf8(p.output).unwrap();
        assert!(transcript.contains("Please, enter a valid url"));
        assert!(transcript.contains("Please, enter a valid name"));
        assert!(transcript.contains("Please, pick Low or High quality"));
    }

    #[test]
    fn test_prefilled_skips_prompts() {
        let mut p = prompter("");
        let request = p
            .collect(Prefilled {
                url: Some("https://example.com/c/1".to_string()),
                filename: Some("issue".to_string()),
                quality: Some("hq".to_string()),
            })
            .unwrap();
        assert_eq!(request.quality, Quality::High);
        assert!(p.output.is_empty());
    }

    #[test]
    fn test_invalid_prefilled_value_is_error() {
        let mut p = prompter("");
        let result = p.collect(Prefilled {
            url: Some("not a url".to_string()),
            ..Prefilled::default()
        });
        assert!(matches!(result, Err(InputError::InvalidUrl(_))));
    }

    #[test]
    fn test_closed_input() {
        let mut p = prompter("https://example.com/c/1\n");
        assert_eq!(p.collect(Prefilled::default()), Err(InputError::Closed));
    }
}
