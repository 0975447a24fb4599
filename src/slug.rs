use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Normalize a folder name, query, or descriptor value into a slug.
///
/// Compatibility forms are decomposed and combining marks dropped, the
/// text is transliterated to ASCII and lowercased, and everything that is
/// not an ASCII letter or digit (whitespace, punctuation, `_`, `-`) is
/// removed. The same function is used at index time and at query time, so
/// a query matches a folder whenever its slug is a substring of the
/// folder's slug, whichever script either side was typed in.
///
/// # Examples
///
/// ```
/// use archdex::slug::slugify;
///
/// assert_eq!(slugify("Ivanov_Dom5"), "ivanovdom5");
/// assert_eq!(slugify("Иванов_Дом5"), "ivanovdom5");
/// assert_eq!(slugify("+38 (099) 123-45-67"), "380991234567");
/// assert_eq!(slugify("Café"), "cafe");
/// ```
pub fn slugify(input: &str) -> String {
    let folded: String =
        input.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    deunicode::deunicode(&folded)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
