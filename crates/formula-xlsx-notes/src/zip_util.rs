use std::io::Read;

use crate::XlsxError;

/// Default maximum uncompressed size permitted for any single ZIP part inflated into memory.
///
/// This is a guardrail against ZIP bombs (tiny compressed size, huge uncompressed size) and
/// forged ZIP metadata (e.g. an incorrect `uncompressed_size` field).
pub(crate) const DEFAULT_MAX_ZIP_PART_BYTES: u64 = 256 * 1024 * 1024; // 256MiB

/// Default maximum total uncompressed bytes permitted when inflating a whole package.
pub(crate) const DEFAULT_MAX_ZIP_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512MiB

/// Compare two OPC part names the way producers in the wild treat them: ignoring a leading `/`,
/// treating `\` as `/`, and ignoring ASCII case.
pub(crate) fn zip_part_names_equivalent(a: &str, b: &str) -> bool {
    fn normalized(name: &str) -> impl Iterator<Item = u8> + '_ {
        name.trim_start_matches(['/', '\\'])
            .bytes()
            .map(|b| if b == b'\\' { b'/' } else { b.to_ascii_lowercase() })
    }

    normalized(a).eq(normalized(b))
}

#[derive(Debug, Clone)]
pub(crate) struct ZipInflateBudget {
    max_total_bytes: u64,
    used_bytes: u64,
}

impl ZipInflateBudget {
    pub(crate) fn new(max_total_bytes: u64) -> Self {
        Self {
            max_total_bytes,
            used_bytes: 0,
        }
    }

    fn remaining_bytes(&self) -> u64 {
        self.max_total_bytes.saturating_sub(self.used_bytes)
    }

    fn consume(&mut self, bytes: u64) -> Result<(), XlsxError> {
        self.used_bytes = self.used_bytes.saturating_add(bytes);
        if self.used_bytes > self.max_total_bytes {
            return Err(XlsxError::PackageTooLarge {
                total: self.used_bytes,
                max: self.max_total_bytes,
            });
        }
        Ok(())
    }
}

/// Read one ZIP entry into memory while enforcing both a per-part and a package-wide limit.
///
/// `declared_size` is only used as a fast-path rejection; the read itself is bounded by
/// `limit + 1` bytes so forged size metadata cannot drive an unbounded allocation.
pub(crate) fn read_zip_entry_with_budget<R: Read>(
    entry: R,
    declared_size: u64,
    part: &str,
    max_part_bytes: u64,
    budget: &mut ZipInflateBudget,
) -> Result<Vec<u8>, XlsxError> {
    if declared_size > max_part_bytes {
        return Err(XlsxError::PartTooLarge {
            part: part.to_string(),
            size: declared_size,
            max: max_part_bytes,
        });
    }

    let remaining_total = budget.remaining_bytes();
    let effective_max = max_part_bytes.min(remaining_total);
    let limit_is_total = effective_max < max_part_bytes;

    let mut buf = Vec::new();
    entry
        .take(effective_max.saturating_add(1))
        .read_to_end(&mut buf)?;

    let observed = buf.len() as u64;
    if observed > effective_max {
        if limit_is_total {
            return Err(XlsxError::PackageTooLarge {
                total: budget.used_bytes.saturating_add(observed),
                max: budget.max_total_bytes,
            });
        }
        return Err(XlsxError::PartTooLarge {
            part: part.to_string(),
            size: observed,
            max: max_part_bytes,
        });
    }

    budget.consume(observed)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_names_equivalent_ignores_case_and_separators() {
        assert!(zip_part_names_equivalent("xl/comments1.xml", "/XL/Comments1.xml"));
        assert!(zip_part_names_equivalent("xl\\drawings\\vmlDrawing1.vml", "xl/drawings/vmlDrawing1.vml"));
        assert!(!zip_part_names_equivalent("xl/comments1.xml", "xl/comments2.xml"));
    }

    #[test]
    fn entry_over_part_limit_is_rejected_even_with_forged_size() {
        let mut budget = ZipInflateBudget::new(1024);
        let err = read_zip_entry_with_budget(&[0u8; 32][..], 4, "xl/big.bin", 16, &mut budget)
            .unwrap_err();
        assert!(matches!(err, XlsxError::PartTooLarge { size: 17, max: 16, .. }));
    }

    #[test]
    fn budget_spans_multiple_entries() {
        let mut budget = ZipInflateBudget::new(10);
        read_zip_entry_with_budget(&[0u8; 6][..], 6, "a", 100, &mut budget).unwrap();
        let err = read_zip_entry_with_budget(&[0u8; 6][..], 6, "b", 100, &mut budget).unwrap_err();
        assert!(matches!(err, XlsxError::PackageTooLarge { max: 10, .. }));
    }
}
