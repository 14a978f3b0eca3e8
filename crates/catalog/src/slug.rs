/// URL slug for a product or collection name: lowercase alphanumerics (in any
/// script) joined by single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separators_and_lowercases() {
        assert_eq!(slugify("  Linen  Shirt -- Slim Fit! "), "linen-shirt-slim-fit");
    }

    #[test]
    fn punctuation_only_name_has_empty_slug() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn non_latin_names_keep_their_letters() {
        assert_eq!(slugify("Рубашка Лён"), "рубашка-лён");
        assert_eq!(slugify("シャツ 2 Pack"), "シャツ-2-pack");
        assert_ne!(slugify("Платье"), slugify("Юбка"));
    }
}
