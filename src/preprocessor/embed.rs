//! `#embed` (C23): turns the raw bytes of a resource into a comma-separated sequence of integer
//! constants, subject to an optional `limit(N)` parameter and the session-wide soft/hard caps
//! (spec.md's supplemented resolution for the "how big is too big" open question: a soft limit
//! warns, a hard limit is a hard error).

use crate::diagnostics::{Diagnostic, Diagnostics, Fatal, Severity};
use crate::token::Token;

use super::expand::{comma_token, int_token};

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedParams {
    pub limit: Option<u64>,
}

/// Scans an `#embed` directive's parameter tokens (after the filename) for `limit(N)`. Unknown
/// parameters are ignored; this front end only implements the subset needed to bound output
/// size.
pub fn parse_params(tokens: &[Token]) -> EmbedParams {
    let mut params = EmbedParams::default();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].text == "limit" && tokens.get(i + 1).map(|t| t.is("(")).unwrap_or(false) {
            if let Some(n_tok) = tokens.get(i + 2) {
                if let Ok(n) = n_tok.text.parse::<u64>() {
                    params.limit = Some(n);
                }
            }
            i += 4;
            continue;
        }
        i += 1;
    }
    params
}

/// Converts `bytes` into the `#embed` token sequence, enforcing `params.limit` and the
/// session-wide soft/hard caps. `like` supplies source provenance for the synthesized tokens.
pub fn embed_tokens(
    bytes: &[u8],
    params: &EmbedParams,
    soft_limit: Option<u64>,
    hard_limit: Option<u64>,
    like: &Token,
    diags: &mut Diagnostics,
) -> Result<Vec<Token>, Fatal> {
    let available = bytes.len() as u64;
    let n = params.limit.map(|l| l.min(available)).unwrap_or(available);

    if let Some(hard) = hard_limit {
        if n > hard {
            return Err(Fatal(Diagnostic::new(
                Severity::Fatal,
                Some(like.prov.file),
                format!("<file {}>", like.prov.file.0),
                like.prov.line,
                like.prov.col,
                format!("#embed resource of {} bytes exceeds the hard limit of {} bytes", n, hard),
            )));
        }
    }
    if let Some(soft) = soft_limit {
        if n > soft {
            diags.report(Diagnostic::new(
                Severity::Warning,
                Some(like.prov.file),
                format!("<file {}>", like.prov.file.0),
                like.prov.line,
                like.prov.col,
                format!("#embed resource of {} bytes exceeds the recommended limit of {} bytes", n, soft),
            ))?;
        }
    }

    let n = n as usize;
    let mut out = Vec::with_capacity(n * 2);
    for (i, b) in bytes[..n].iter().enumerate() {
        if i > 0 {
            out.push(comma_token());
        }
        out.push(int_token(*b as i64, like));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileId;
    use crate::token::{NumValue, Provenance, TokenKind};

    fn like_token() -> Token {
        Token {
            kind: TokenKind::Punct,
            text: "#".into(),
            prov: Provenance { file: FileId(0), line: 1, col: 1, at_beginning_of_line: true, has_leading_space: false },
            num: NumValue::None,
            str_val: None,
            hideset: Default::default(),
            origin: None,
            keyword: None,
        }
    }

    #[test]
    fn produces_one_token_per_byte_plus_commas() {
        let mut diags = Diagnostics::new();
        let out = embed_tokens(&[1, 2, 3], &EmbedParams::default(), None, None, &like_token(), &mut diags).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].text, "1");
        assert_eq!(out[2].text, "2");
    }

    #[test]
    fn limit_parameter_truncates() {
        let mut diags = Diagnostics::new();
        let params = EmbedParams { limit: Some(1) };
        let out = embed_tokens(&[1, 2, 3], &params, None, None, &like_token(), &mut diags).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn hard_limit_violation_is_fatal() {
        let mut diags = Diagnostics::new();
        let out = embed_tokens(&[1, 2, 3], &EmbedParams::default(), None, Some(2), &like_token(), &mut diags);
        assert!(out.is_err());
    }
}
