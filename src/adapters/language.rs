use whatlang::Lang;

/// Detect the dominant language of a text, as an ISO 639-1 code.
///
/// Returns `None` when detection is inconclusive or the language has no
/// two-letter code; callers fall back to a configured default.
pub fn detect_language(text: &str) -> Option<String> {
    let info = whatlang::detect(text)?;
    if !info.is_reliable() {
        return None;
    }
    iso_639_1(info.lang()).map(str::to_string)
}

/// Two-letter codes for the languages the speech backend covers.
fn iso_639_1(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Pol => "pl",
        Lang::Nld => "nl",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Fin => "fi",
        Lang::Tur => "tr",
        Lang::Ara => "ar",
        Lang::Heb => "he",
        Lang::Hin => "hi",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Cmn => "zh",
        Lang::Vie => "vi",
        Lang::Ind => "id",
        Lang::Tha => "th",
        Lang::Ell => "el",
        Lang::Ces => "cs",
        Lang::Ron => "ro",
        Lang::Hun => "hu",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_english() {
        let text = "The quick brown fox jumps over the lazy dog, and the \
                    weather today is absolutely wonderful for a long walk.";
        assert_eq!(detect_language(text), Some("en".to_string()));
    }

    #[test]
    fn detects_spanish() {
        let text = "El rápido zorro marrón salta sobre el perro perezoso, \
                    y el clima de hoy es maravilloso para caminar por el parque.";
        assert_eq!(detect_language(text), Some("es".to_string()));
    }

    #[test]
    fn inconclusive_input_yields_none() {
        assert_eq!(detect_language(""), None);
        assert_eq!(detect_language("123 456"), None);
    }
}
