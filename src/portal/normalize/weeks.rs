//! Teaching-week codes such as `"1-16周"`, `"1-15周(单)"` or `"3周,5周,7-9周"`.

use super::periods::numbers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    Any,
    Odd,
    Even,
}

impl Parity {
    fn of(token: &str) -> Self {
        if token.contains('单') {
            Self::Odd
        } else if token.contains('双') {
            Self::Even
        } else {
            Self::Any
        }
    }

    fn admits(self, week: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Odd => week % 2 == 1,
            Self::Even => week % 2 == 0,
        }
    }
}

/// Expand a week code into the list of teaching weeks, in code order.
///
/// Tokens that are neither a single week nor a two-ended range are skipped.
pub fn decode_weeks(code: &str) -> Vec<u32> {
    let mut weeks = Vec::new();
    for token in code.split([',', '，']).map(str::trim).filter(|t| !t.is_empty()) {
        let nums = numbers(token);
        if token.contains('-') {
            let [from, to] = nums.as_slice() else {
                continue;
            };
            let parity = Parity::of(token);
            weeks.extend((*from..=*to).filter(|w| parity.admits(*w)));
        } else if let [week] = nums.as_slice() {
            weeks.push(*week);
        }
    }
    weeks
}

/// Render a sorted week list back into compact range form, e.g. `"1-4周,6周"`.
pub fn encode_weeks(weeks: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut iter = weeks.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        parts.push(if start == end {
            format!("{start}周")
        } else {
            format!("{start}-{end}周")
        });
    }
    parts.join(",")
}
