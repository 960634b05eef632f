/// Upstream API locations. Production defaults; tests point every field at
/// a local mock server with [`Endpoints::with_base`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub hf_models: String,
    pub hf_daily_papers: String,
    pub arxiv_query: String,
    pub sec_tickers: String,
    pub sec_submissions: String,
    pub sec_company_facts: String,
    pub sec_full_text_search: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            hf_models: "https://huggingface.co/api/models".to_string(),
            hf_daily_papers: "https://huggingface.co/api/daily_papers".to_string(),
            arxiv_query: "https://export.arxiv.org/api/query".to_string(),
            sec_tickers: "https://www.sec.gov/files/company_tickers.json".to_string(),
            sec_submissions: "https://data.sec.gov/submissions".to_string(),
            sec_company_facts: "https://data.sec.gov/api/xbrl/companyfacts".to_string(),
            sec_full_text_search: "https://efts.sec.gov/LATEST/search-index".to_string(),
        }
    }
}

impl Endpoints {
    /// Same paths as production, all served from `base`.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            hf_models: format!("{}/api/models", base),
            hf_daily_papers: format!("{}/api/daily_papers", base),
            arxiv_query: format!("{}/api/query", base),
            sec_tickers: format!("{}/files/company_tickers.json", base),
            sec_submissions: format!("{}/submissions", base),
            sec_company_facts: format!("{}/api/xbrl/companyfacts", base),
            sec_full_text_search: format!("{}/LATEST/search-index", base),
        }
    }

    /// `cik` must already be the 10-digit form.
    pub fn submissions_url(&self, cik: &str) -> String {
        format!("{}/CIK{}.json", self.sec_submissions, cik)
    }

    pub fn company_facts_url(&self, cik: &str) -> String {
        format!("{}/CIK{}.json", self.sec_company_facts, cik)
    }
}
