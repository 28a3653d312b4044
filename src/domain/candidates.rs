//! Candidate name generation for the character-combination categories.
//!
//! A category name is `<length>_<charset>`, e.g. `three_digit_letter`:
//!
//! - `digit` - `0-9` only
//! - `letter` - `a-z` only
//! - `digit_letter` - digits and letters, at least one of each
//! - `special` - digits, letters and `-`, at least one `-`, never leading or
//!   trailing

/// Every character-combination category, shortest names first.
pub const CATEGORIES: &[&str] = &[
    "one_digit",
    "one_letter",
    "two_digit",
    "two_letter",
    "two_digit_letter",
    "three_digit",
    "three_letter",
    "three_digit_letter",
    "three_special",
    "four_digit",
    "four_letter",
    "four_digit_letter",
    "four_special",
    "five_digit",
    "five_letter",
    "five_digit_letter",
    "five_special",
];

const DIGITS: &[u8] = b"0123456789";
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const MIXED: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const WITH_HYPHEN: &[u8] = b"-0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Digit,
    Letter,
    DigitLetter,
    Special,
}

impl Charset {
    fn alphabet(&self) -> &'static [u8] {
        match self {
            Self::Digit => DIGITS,
            Self::Letter => LETTERS,
            Self::DigitLetter => MIXED,
            Self::Special => WITH_HYPHEN,
        }
    }

    fn accepts(&self, name: &[u8]) -> bool {
        match self {
            Self::Digit | Self::Letter => true,
            Self::DigitLetter => {
                name.iter().any(u8::is_ascii_digit) && name.iter().any(u8::is_ascii_lowercase)
            }
            Self::Special => {
                name.contains(&b'-')
                    && name.first() != Some(&b'-')
                    && name.last() != Some(&b'-')
            }
        }
    }
}

/// All names of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSet {
    pub len: usize,
    pub charset: Charset,
}

impl CandidateSet {
    /// Parses a category name. Returns `None` for categories that are not
    /// character combinations.
    pub fn for_category(category: &str) -> Option<Self> {
        let (len, charset) = category.split_once('_')?;
        let len = match len {
            "one" => 1,
            "two" => 2,
            "three" => 3,
            "four" => 4,
            "five" => 5,
            _ => return None,
        };
        let charset = match charset {
            "digit" => Charset::Digit,
            "letter" => Charset::Letter,
            "digit_letter" => Charset::DigitLetter,
            "special" => Charset::Special,
            _ => return None,
        };
        Some(Self { len, charset })
    }

    /// Every accepted name in lexicographic order of the charset's alphabet.
    pub fn names(&self) -> impl Iterator<Item = String> + Send + use<> {
        let charset = self.charset;
        Product::new(charset.alphabet(), self.len)
            .filter(move |name| charset.accepts(name))
            .map(|name| String::from_utf8_lossy(&name).into_owned())
    }
}

/// Cartesian power of an alphabet, odometer style.
struct Product {
    alphabet: &'static [u8],
    indices: Vec<usize>,
    done: bool,
}

impl Product {
    fn new(alphabet: &'static [u8], len: usize) -> Self {
        Self {
            alphabet,
            indices: vec![0; len],
            done: len == 0 || alphabet.is_empty(),
        }
    }
}

impl Iterator for Product {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.done {
            return None;
        }
        let item = self.indices.iter().map(|&i| self.alphabet[i]).collect();

        // Advance from the last position, carrying leftwards
        let mut pos = self.indices.len();
        loop {
            if pos == 0 {
                self.done = true;
                break;
            }
            pos -= 1;
            self.indices[pos] += 1;
            if self.indices[pos] < self.alphabet.len() {
                break;
            }
            self.indices[pos] = 0;
        }

        Some(item)
    }
}
