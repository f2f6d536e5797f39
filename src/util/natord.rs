//! Natural ordering of strings, in the manner of `strnatcmp`.
//!
//! Runs of ASCII digits are compared by their numeric value and everything else is compared
//! byte-wise, so that `a2` sorts before `a10`.

use std::cmp::Ordering;

pub fn compare(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let a_end = digits_end(a, i);
            let b_end = digits_end(b, j);
            match compare_numeric(&a[i..a_end], &b[j..b_end]) {
                Ordering::Equal => {}
                ord => return ord,
            }
            i = a_end;
            j = b_end;
        } else {
            match a[i].cmp(&b[j]) {
                Ordering::Equal => {}
                ord => return ord,
            }
            i += 1;
            j += 1;
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

fn digits_end(s: &[u8], start: usize) -> usize {
    s[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(s.len(), |n| start + n)
}

fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let trim = |s: &[u8]| -> usize { s.iter().take_while(|&&b| b == b'0').count() };
    let (a_trimmed, b_trimmed) = (&a[trim(a)..], &b[trim(b)..]);
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        // Equal values: the run with fewer leading zeroes first.
        .then_with(|| a.len().cmp(&b.len()))
}
