//! Turns a careers page into `JobCandidate`s.
//!
//! Candidates missing a title, link or external id are dropped, not
//! reported as errors. The caller only sees the count of drops.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::models::job::JobCandidate;
use crate::scraping::rule::ScrapingRule;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid selector for '{field}': {selector}")]
    InvalidSelector { field: &'static str, selector: String },
}

/// Why a container did not yield a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionGap {
    MissingTitle,
    MissingLink,
    MissingExternalId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub candidates: Vec<JobCandidate>,
    pub dropped: usize,
}

/// An extraction strategy. Pure: no I/O, no side effects.
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, company_id: Uuid, page_url: &Url) -> Extraction;
}

/// Extractor driven by a compiled `ScrapingRule`.
#[derive(Debug)]
pub struct SelectorExtractor {
    container: Selector,
    title: Selector,
    location: Option<Selector>,
    department: Option<Selector>,
    job_type: Option<Selector>,
    salary_range: Option<Selector>,
    description: Option<Selector>,
    link: Selector,
    external_id_attribute: String,
}

impl SelectorExtractor {
    pub fn compile(rule: &ScrapingRule) -> Result<Self, RuleError> {
        Ok(Self {
            container: parse("job_container", &rule.job_container)?,
            title: parse("title", &rule.title)?,
            location: parse_optional("location", rule.location.as_deref())?,
            department: parse_optional("department", rule.department.as_deref())?,
            job_type: parse_optional("job_type", rule.job_type.as_deref())?,
            salary_range: parse_optional("salary_range", rule.salary_range.as_deref())?,
            description: parse_optional("description", rule.description.as_deref())?,
            link: parse("link", &rule.link)?,
            external_id_attribute: rule.external_id_attribute.clone(),
        })
    }

    /// Lazily walks every job container in `document`.
    pub fn candidates<'a>(
        &'a self,
        document: &'a Html,
        company_id: Uuid,
        page_url: &'a Url,
    ) -> impl Iterator<Item = Result<JobCandidate, ExtractionGap>> + 'a {
        document
            .select(&self.container)
            .map(move |container| self.candidate_from(container, company_id, page_url))
    }

    fn candidate_from(
        &self,
        container: ElementRef<'_>,
        company_id: Uuid,
        page_url: &Url,
    ) -> Result<JobCandidate, ExtractionGap> {
        let external_id = container
            .value()
            .attr(&self.external_id_attribute)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ExtractionGap::MissingExternalId)?
            .to_string();

        let job_url = container
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .and_then(|href| page_url.join(href).ok())
            .ok_or(ExtractionGap::MissingLink)?
            .to_string();

        let title = select_text(container, Some(&self.title)).ok_or(ExtractionGap::MissingTitle)?;

        Ok(JobCandidate {
            company_id,
            title,
            description: select_text(container, self.description.as_ref()),
            location: select_text(container, self.location.as_ref()),
            department: select_text(container, self.department.as_ref()),
            job_type: select_text(container, self.job_type.as_ref()),
            salary_range: select_text(container, self.salary_range.as_ref()),
            job_url,
            external_id,
        })
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, html: &str, company_id: Uuid, page_url: &Url) -> Extraction {
        let document = Html::parse_document(html);
        let mut extraction = Extraction::default();
        for result in self.candidates(&document, company_id, page_url) {
            match result {
                Ok(candidate) => extraction.candidates.push(candidate),
                Err(gap) => {
                    debug!("Dropping job container for company {company_id}: {gap:?}");
                    extraction.dropped += 1;
                }
            }
        }
        extraction
    }
}

fn parse(field: &'static str, selector: &str) -> Result<Selector, RuleError> {
    Selector::parse(selector).map_err(|_| RuleError::InvalidSelector {
        field,
        selector: selector.to_string(),
    })
}

fn parse_optional(field: &'static str, selector: Option<&str>) -> Result<Option<Selector>, RuleError> {
    selector
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse(field, s))
        .transpose()
}

/// Whitespace-collapsed text of the first match, `None` when absent or blank.
fn select_text(container: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let element = container.select(selector?).next()?;
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <ul>
            <li class="job-listing" data-job-id="J1">
              <a href="/careers/j1"><span class="title">  Backend
                 Engineer </span></a>
              <span class="location">Berlin</span>
            </li>
            <li class="job-listing" data-job-id="J2">
              <a href="https://jobs.example.com/j2"><span class="title">Analyst</span></a>
              <span class="location">   </span>
            </li>
            <li class="job-listing">
              <a href="/careers/nope"><span class="title">No id</span></a>
            </li>
            <li class="job-listing" data-job-id="J4">
              <span class="title">No link</span>
            </li>
            <li class="job-listing" data-job-id="J5">
              <a href="/careers/j5"><span class="title"> </span></a>
            </li>
          </ul>
        </body></html>
    "#;

    fn page_url() -> Url {
        Url::parse("https://example.com/about/careers").unwrap()
    }

    #[test]
    fn test_default_rule_extracts_complete_candidates() {
        let extractor = SelectorExtractor::compile(&ScrapingRule::default()).unwrap();
        let company_id = Uuid::new_v4();

        let extraction = extractor.extract(PAGE, company_id, &page_url());

        assert_eq!(extraction.candidates.len(), 2);
        assert_eq!(extraction.dropped, 3);

        let first = &extraction.candidates[0];
        assert_eq!(first.company_id, company_id);
        assert_eq!(first.external_id, "J1");
        assert_eq!(first.title, "Backend Engineer");
        assert_eq!(first.job_url, "https://example.com/careers/j1");
        assert_eq!(first.location.as_deref(), Some("Berlin"));

        let second = &extraction.candidates[1];
        assert_eq!(second.job_url, "https://jobs.example.com/j2");
        assert_eq!(second.location, None);
    }

    #[test]
    fn test_lazy_iterator_reports_gap_kinds() {
        let extractor = SelectorExtractor::compile(&ScrapingRule::default()).unwrap();
        let document = Html::parse_document(PAGE);
        let url = page_url();

        let gaps: Vec<_> = extractor
            .candidates(&document, Uuid::new_v4(), &url)
            .filter_map(Result::err)
            .collect();

        assert_eq!(
            gaps,
            vec![
                ExtractionGap::MissingExternalId,
                ExtractionGap::MissingLink,
                ExtractionGap::MissingTitle
            ]
        );
    }

    #[test]
    fn test_custom_rule_fields() {
        let rule = ScrapingRule {
            job_container: "div.opening".to_string(),
            title: "h2".to_string(),
            location: None,
            department: Some(".dept".to_string()),
            job_type: Some(".kind".to_string()),
            salary_range: Some(".pay".to_string()),
            link: "a.apply".to_string(),
            description: Some("p".to_string()),
            external_id_attribute: "data-req".to_string(),
        };
        let html = r##"
            <div class="opening" data-req="R-77">
              <h2>Data Engineer</h2>
              <span class="dept">Platform</span>
              <span class="kind">Full-time</span>
              <span class="pay">$120k - $150k</span>
              <p>Build   pipelines.</p>
              <a href="#top">Top</a>
              <a class="apply" href="apply/77">Apply</a>
            </div>
        "##;
        let extractor = SelectorExtractor::compile(&rule).unwrap();

        let extraction = extractor.extract(html, Uuid::new_v4(), &page_url());

        assert_eq!(extraction.dropped, 0);
        let job = &extraction.candidates[0];
        assert_eq!(job.external_id, "R-77");
        assert_eq!(job.department.as_deref(), Some("Platform"));
        assert_eq!(job.job_type.as_deref(), Some("Full-time"));
        assert_eq!(job.salary_range.as_deref(), Some("$120k - $150k"));
        assert_eq!(job.description.as_deref(), Some("Build pipelines."));
        assert_eq!(job.job_url, "https://example.com/about/apply/77");
    }

    #[test]
    fn test_invalid_selector_is_a_rule_error() {
        let rule = ScrapingRule {
            job_container: "li[".to_string(),
            ..ScrapingRule::default()
        };
        let err = SelectorExtractor::compile(&rule).unwrap_err();
        assert!(matches!(
            err,
            RuleError::InvalidSelector {
                field: "job_container",
                ..
            }
        ));
    }

    #[test]
    fn test_page_without_containers_is_empty() {
        let extractor = SelectorExtractor::compile(&ScrapingRule::default()).unwrap();
        let extraction = extractor.extract("<html><body></body></html>", Uuid::new_v4(), &page_url());
        assert_eq!(extraction, Extraction::default());
    }
}
