use deunicode::deunicode;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::error::GeoError;
use crate::regions::{self, RegionSet};

const COUNTRIES_TSV: &str = include_str!("../data/countries.tsv");
const CITIES_TSV: &str = include_str!("../data/cities.tsv");
const COUNTRY_TERMS_TXT: &str = include_str!("../data/country_terms.txt");

/// Phrases that are never worth querying on their own.
const DO_NOT_MATCH_PHRASES: &[&str] = &["university hospital"];

#[derive(Debug, Clone)]
pub struct Country {
    pub iso2: String,
    pub iso3: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct City {
    pub name: String,
    pub country: String,
    pub population: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TermKind {
    /// Uppercase code, compared against case-preserved tokens.
    Code,
    /// Lowercase name, compared against lowercased text.
    Name,
}

#[derive(Debug, Clone)]
pub(crate) struct CountryTerm {
    pub code: String,
    pub term: String,
    pub kind: TermKind,
}

/// Read-only country and city reference tables.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it after
/// construction.
#[derive(Debug)]
pub struct Gazetteer {
    countries: Vec<Country>,
    terms: Vec<CountryTerm>,
    /// Lowercased country names, ISO codes and alias names.
    country_keys: HashSet<String>,
    iso3: HashSet<String>,
    /// Lowercased city name -> largest population under that name.
    cities: HashMap<String, u64>,
}

impl Gazetteer {
    /// Tables compiled into the binary.
    pub fn embedded() -> Result<Self, GeoError> {
        Self::from_sources(COUNTRIES_TSV, CITIES_TSV, COUNTRY_TERMS_TXT)
    }

    pub fn from_sources(countries_tsv: &str, cities_tsv: &str, terms_txt: &str) -> Result<Self, GeoError> {
        let countries = parse_countries(countries_tsv)?;
        let cities = parse_cities(cities_tsv)?;

        let mut terms: Vec<CountryTerm> = Vec::with_capacity(countries.len() * 3);
        for country in &countries {
            terms.push(CountryTerm {
                code: country.iso2.clone(),
                term: fold(&country.name),
                kind: TermKind::Name,
            });
            for code in [&country.iso2, &country.iso3] {
                terms.push(CountryTerm {
                    code: country.iso2.clone(),
                    term: code.clone(),
                    kind: TermKind::Code,
                });
            }
        }

        let mut dropped = Vec::new();
        for (idx, line) in data_lines(terms_txt) {
            let (drop, line) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let (code, term) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| GeoError::parse("country_terms", idx, "expected `CODE term`"))?;
            let code = code.trim().to_uppercase();
            let term = term.trim();

            let kind = if term.chars().all(|c| c.is_ascii_uppercase()) {
                TermKind::Code
            } else {
                TermKind::Name
            };
            let term = match kind {
                TermKind::Code => term.to_string(),
                TermKind::Name => fold(term),
            };

            if drop {
                dropped.push((code, term));
            } else if !terms.iter().any(|t| t.code == code && t.term == term) {
                terms.push(CountryTerm { code, term, kind });
            }
        }
        terms.retain(|t| !dropped.iter().any(|(code, term)| *code == t.code && *term == t.term));

        let mut country_keys = HashSet::new();
        for country in &countries {
            country_keys.insert(fold(&country.name));
            country_keys.insert(country.iso2.to_lowercase());
            country_keys.insert(country.iso3.to_lowercase());
        }
        for term in &terms {
            country_keys.insert(term.term.to_lowercase());
        }

        let iso3 = countries.iter().map(|c| c.iso3.to_lowercase()).collect();

        let mut city_index: HashMap<String, u64> = HashMap::new();
        for city in &cities {
            let entry = city_index.entry(fold(&city.name)).or_insert(0);
            *entry = (*entry).max(city.population);
        }

        debug!(
            countries = countries.len(),
            cities = city_index.len(),
            terms = terms.len(),
            "Gazetteer loaded"
        );

        Ok(Self {
            countries,
            terms,
            country_keys,
            iso3,
            cities: city_index,
        })
    }

    /// Embedded country tables with a caller-supplied city table, either the
    /// compact `name<TAB>country<TAB>population` form or a raw GeoNames
    /// `cities15000.txt` dump.
    pub fn with_cities(cities_source: &str) -> Result<Self, GeoError> {
        Self::from_sources(COUNTRIES_TSV, cities_source, COUNTRY_TERMS_TXT)
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub(crate) fn terms(&self) -> &[CountryTerm] {
        &self.terms
    }

    /// Case-insensitive ISO alpha-3 lookup.
    pub fn is_iso3(&self, token: &str) -> bool {
        self.iso3.contains(&token.to_lowercase())
    }

    /// Exact (case and accent insensitive) country name, alias or ISO code.
    pub fn is_country(&self, text: &str) -> bool {
        self.country_keys.contains(&fold(text))
    }

    /// Exact city name with population above `min_population`.
    pub fn is_city(&self, text: &str, min_population: u64) -> bool {
        self.cities
            .get(&fold(text))
            .is_some_and(|population| *population > min_population)
    }

    /// Bare geography or generic phrases that must not be searched alone.
    pub fn is_do_not_match(&self, text: &str, min_population: u64) -> bool {
        let folded = fold(text);
        DO_NOT_MATCH_PHRASES.contains(&folded.as_str())
            || self.is_country(&folded)
            || self.is_city(&folded, min_population)
    }

    /// Country mentions in free text, mapped to region buckets.
    pub fn extract_regions(&self, text: &str) -> RegionSet {
        self.extract_country_codes(text)
            .iter()
            .map(|code| regions::to_region(code))
            .collect()
    }

    /// Alpha-2 codes of the countries mentioned in `text`.
    pub fn extract_country_codes(&self, text: &str) -> BTreeSet<String> {
        regions::detect_codes(self, text)
    }
}

/// Lowercase ascii form used for all exact lookups.
fn fold(text: &str) -> String {
    normalize::collapse_whitespace(&deunicode(text).to_lowercase())
}

fn data_lines(source: &str) -> impl Iterator<Item = (usize, &str)> {
    source
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn parse_countries(source: &str) -> Result<Vec<Country>, GeoError> {
    data_lines(source)
        .map(|(idx, line)| {
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            match fields.as_slice() {
                [iso2, iso3, name] if iso2.len() == 2 && iso3.len() == 3 => Ok(Country {
                    iso2: iso2.to_uppercase(),
                    iso3: iso3.to_uppercase(),
                    name: name.to_string(),
                }),
                _ => Err(GeoError::parse("countries", idx, "expected `iso2<TAB>iso3<TAB>name`")),
            }
        })
        .collect()
}

/// Population column of a GeoNames geoname dump row.
const GEONAMES_POPULATION: usize = 14;

fn parse_cities(source: &str) -> Result<Vec<City>, GeoError> {
    let mut cities = Vec::new();
    for (idx, line) in data_lines(source) {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        match fields.as_slice() {
            [name, country, population] => cities.push(City {
                name: name.to_string(),
                country: country.to_uppercase(),
                population: parse_population(population, idx)?,
            }),
            // geonameid, name, asciiname, alternatenames, lat, lon, feature class,
            // feature code, country code, cc2, admin1-4, population, ...
            row if row.len() > GEONAMES_POPULATION => {
                let population = parse_population(row[GEONAMES_POPULATION], idx)?;
                let country = row[8].to_uppercase();
                for name in [row[1], row[2]] {
                    if name.is_empty() || cities.last().is_some_and(|c: &City| c.name == name) {
                        continue;
                    }
                    cities.push(City {
                        name: name.to_string(),
                        country: country.clone(),
                        population,
                    });
                }
            }
            _ => {
                return Err(GeoError::parse(
                    "cities",
                    idx,
                    "expected `name<TAB>country<TAB>population` or a GeoNames dump row",
                ));
            }
        }
    }
    Ok(cities)
}

fn parse_population(value: &str, idx: usize) -> Result<u64, GeoError> {
    value
        .parse()
        .map_err(|_| GeoError::parse("cities", idx, "population is not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_tables_load() {
        let gazetteer = Gazetteer::embedded().unwrap();
        assert!(gazetteer.countries().len() > 240);
        assert!(gazetteer.is_iso3("usa"));
        assert!(gazetteer.is_iso3("GBR"));
        assert!(!gazetteer.is_iso3("MIT"));
    }

    #[test]
    fn test_do_not_match() {
        let gazetteer = Gazetteer::embedded().unwrap();
        assert!(gazetteer.is_do_not_match("Mexico", 15000));
        assert!(gazetteer.is_do_not_match("MEX", 15000));
        assert!(gazetteer.is_do_not_match("mx", 15000));
        assert!(gazetteer.is_do_not_match("UK", 15000));
        assert!(gazetteer.is_do_not_match("University Hospital", 15000));
        assert!(gazetteer.is_do_not_match("São Paulo", 15000));
        assert!(gazetteer.is_do_not_match("Cambridge", 15000));
        assert!(!gazetteer.is_do_not_match("University of Excellence", 15000));
        assert!(!gazetteer.is_do_not_match("Creativity Institute", 15000));
    }

    #[test]
    fn test_city_population_threshold() {
        let gazetteer = Gazetteer::embedded().unwrap();
        assert!(gazetteer.is_city("Stanford", 10000));
        assert!(!gazetteer.is_city("Stanford", 15000));
    }

    #[test]
    fn test_dropped_terms() {
        let gazetteer = Gazetteer::embedded().unwrap();
        assert!(
            !gazetteer
                .terms()
                .iter()
                .any(|t| t.code == "JE" && t.term == "jersey")
        );
        // Exact lookups still know the country.
        assert!(gazetteer.is_country("Jersey"));
    }

    #[test]
    fn test_university_towns_are_cities() {
        let gazetteer = Gazetteer::embedded().unwrap();
        for town in ["Aachen", "Pasadena", "Gainesville", "Evanston", "Ithaca", "Tsukuba"] {
            assert!(gazetteer.is_do_not_match(town, 15000), "{town} should be do-not-match");
        }
    }

    #[test]
    fn test_geonames_dump_rows() {
        let dump = "2950159\tBerlin\tBerlin\tBerlim,Berlino\t52.52437\t13.41053\tP\tPPLC\tDE\t\t16\t00\t11000\t11000000\t3426354\t\t74\tEurope/Berlin\t2022-04-22\n\
                    2657896\tZürich\tZurich\t\t47.36667\t8.55\tP\tPPLA\tCH\t\tZH\t112\t261\t\t341730\t\t429\tEurope/Zurich\t2023-01-01\n\
                    5118005\tIthaca\tIthaca\t\t42.44063\t-76.49661\tP\tPPLA2\tUS\t\tNY\t109\t\t\t32108\t\t123\tAmerica/New_York\t2017-05-23";
        let gazetteer = Gazetteer::with_cities(dump).unwrap();
        assert!(gazetteer.is_city("Berlin", 15000));
        assert!(gazetteer.is_city("Zurich", 15000));
        assert!(gazetteer.is_city("Zürich", 15000));
        assert!(gazetteer.is_do_not_match("Ithaca", 15000));
        assert!(!gazetteer.is_city("Evanston", 15000));
    }

    #[test]
    fn test_malformed_source() {
        let err = Gazetteer::from_sources("US\tUSA", "", "").unwrap_err();
        assert!(err.to_string().contains("countries"));
    }
}
