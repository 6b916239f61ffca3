//! Closed catalog of cities the courier service operates in.
//!
//! Entries are stored in lookup form (lowercase, `ё` folded to `е`, hyphens read as
//! spaces). Both the Cyrillic and the Latin spelling of every city are listed.

const KNOWN_CITIES: &[&str] = &[
    "москва",
    "moscow",
    "санкт петербург",
    "saint petersburg",
    "st petersburg",
    "новосибирск",
    "novosibirsk",
    "екатеринбург",
    "yekaterinburg",
    "казань",
    "kazan",
    "нижний новгород",
    "nizhny novgorod",
    "челябинск",
    "chelyabinsk",
    "самара",
    "samara",
    "омск",
    "omsk",
    "ростов на дону",
    "rostov on don",
    "уфа",
    "ufa",
    "красноярск",
    "krasnoyarsk",
    "воронеж",
    "voronezh",
    "пермь",
    "perm",
    "волгоград",
    "volgograd",
    "краснодар",
    "krasnodar",
    "саратов",
    "saratov",
    "тюмень",
    "tyumen",
    "тольятти",
    "tolyatti",
    "ижевск",
    "izhevsk",
    "барнаул",
    "barnaul",
    "ульяновск",
    "ulyanovsk",
    "иркутск",
    "irkutsk",
    "хабаровск",
    "khabarovsk",
    "ярославль",
    "yaroslavl",
    "владивосток",
    "vladivostok",
    "махачкала",
    "makhachkala",
    "томск",
    "tomsk",
    "оренбург",
    "orenburg",
    "кемерово",
    "kemerovo",
    "рязань",
    "ryazan",
    "набережные челны",
    "naberezhnye chelny",
    "пенза",
    "penza",
    "липецк",
    "lipetsk",
    "тула",
    "tula",
    "калининград",
    "kaliningrad",
    "сочи",
    "sochi",
    "балашиха",
    "balashikha",
    "подольск",
    "podolsk",
    "химки",
    "khimki",
    "мытищи",
    "mytishchi",
];

/// Abbreviations and colloquial names mapped onto catalog entries.
const ALIASES: &[(&str, &str)] = &[
    ("мск", "москва"),
    ("msk", "moscow"),
    ("спб", "санкт петербург"),
    ("питер", "санкт петербург"),
    ("петербург", "санкт петербург"),
    ("spb", "saint petersburg"),
    ("piter", "saint petersburg"),
    ("нск", "новосибирск"),
    ("екб", "екатеринбург"),
    ("ekb", "yekaterinburg"),
    ("нн", "нижний новгород"),
    ("нижний", "нижний новгород"),
    ("ростов", "ростов на дону"),
    ("rostov", "rostov on don"),
    ("челны", "набережные челны"),
];

/// Resolve a lookup key through the alias table and return the catalog entry.
pub(crate) fn resolve(key: &str) -> Option<&'static str> {
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, target)| *target)
        .unwrap_or(key);

    KNOWN_CITIES
        .iter()
        .copied()
        .find(|city| *city == canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_alias_targets_a_known_city() {
        for (alias, target) in ALIASES {
            assert!(
                KNOWN_CITIES.contains(target),
                "alias {alias} points at unknown city {target}"
            );
        }
    }

    #[test]
    fn resolves_aliases_and_direct_names() {
        assert_eq!(resolve("спб"), Some("санкт петербург"));
        assert_eq!(resolve("moscow"), Some("moscow"));
        assert_eq!(resolve("atlantis"), None);
    }
}
