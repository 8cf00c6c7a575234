use crate::error::{Error, Result};

/// Values that would make a path parameter resolve to a different endpoint.
/// Rejected up front so a stray argument cannot silently call the wrong
/// route.
const PROJECT_CLASHES: &[&str] = &["types", "lookups"];
const RECORD_ID_CLASHES: &[&str] = &["test", "query", "fields", "choices", "history", "identify"];
const ANALYSIS_ID_CLASHES: &[&str] = &["test", "fields", "choices", "history"];

/// Every route the service exposes, as a tagged kind plus its required path
/// parameters. [`url`](Endpoint::url) validates the parameters and
/// interpolates the path.
#[derive(Debug, Clone, Copy)]
pub enum Endpoint<'a> {
    Projects,
    Types,
    Lookups,
    Fields { project: &'a str },
    Choices { project: &'a str, field: &'a str },
    Get { project: &'a str, cairn_id: &'a str },
    Filter { project: &'a str },
    Query { project: &'a str },
    Create { project: &'a str, test: bool },
    Update { project: &'a str, cairn_id: &'a str, test: bool },
    Delete { project: &'a str, cairn_id: &'a str },
    History { project: &'a str, cairn_id: &'a str },
    Identify { project: &'a str, field: &'a str },
    AnalysisFields { project: &'a str },
    AnalysisChoices { project: &'a str, field: &'a str },
    AnalysisGet { project: &'a str, analysis_id: &'a str },
    AnalysisFilter { project: &'a str },
    AnalysisCreate { project: &'a str, test: bool },
    AnalysisUpdate { project: &'a str, analysis_id: &'a str, test: bool },
    AnalysisDelete { project: &'a str, analysis_id: &'a str },
    AnalysisHistory { project: &'a str, analysis_id: &'a str },
    Register,
    Login,
    Logout,
    LogoutAll,
    Profile,
    Activity,
    Waiting,
    Approve { username: &'a str },
    SiteUsers,
    AllUsers,
}

impl Endpoint<'_> {
    /// Build the full URL for this endpoint under `domain`, validating every
    /// path parameter before interpolation.
    pub fn url(&self, domain: &str) -> Result<String> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(Error::Validation(
                "argument 'domain' was not provided".to_string(),
            ));
        }
        let base = domain.trim_end_matches('/');

        let path = match *self {
            Endpoint::Projects => "projects/".to_string(),
            Endpoint::Types => "projects/types/".to_string(),
            Endpoint::Lookups => "projects/lookups/".to_string(),
            Endpoint::Fields { project } => {
                format!("projects/{}/fields/", project_segment(project)?)
            }
            Endpoint::Choices { project, field } => format!(
                "projects/{}/choices/{}/",
                project_segment(project)?,
                segment("field", field, &[])?
            ),
            Endpoint::Get { project, cairn_id } | Endpoint::Delete { project, cairn_id } => {
                format!(
                    "projects/{}/{}/",
                    project_segment(project)?,
                    record_segment(cairn_id)?
                )
            }
            Endpoint::Filter { project } => format!("projects/{}/", project_segment(project)?),
            Endpoint::Query { project } => {
                format!("projects/{}/query/", project_segment(project)?)
            }
            Endpoint::Create { project, test } => {
                let project = project_segment(project)?;
                if test {
                    format!("projects/{project}/test/")
                } else {
                    format!("projects/{project}/")
                }
            }
            Endpoint::Update {
                project,
                cairn_id,
                test,
            } => {
                let project = project_segment(project)?;
                let cairn_id = record_segment(cairn_id)?;
                if test {
                    format!("projects/{project}/test/{cairn_id}/")
                } else {
                    format!("projects/{project}/{cairn_id}/")
                }
            }
            Endpoint::History { project, cairn_id } => format!(
                "projects/{}/history/{}/",
                project_segment(project)?,
                record_segment(cairn_id)?
            ),
            Endpoint::Identify { project, field } => format!(
                "projects/{}/identify/{}/",
                project_segment(project)?,
                segment("field", field, &[])?
            ),
            Endpoint::AnalysisFields { project } => {
                format!("projects/{}/analysis/fields/", project_segment(project)?)
            }
            Endpoint::AnalysisChoices { project, field } => format!(
                "projects/{}/analysis/choices/{}/",
                project_segment(project)?,
                segment("field", field, &[])?
            ),
            Endpoint::AnalysisGet {
                project,
                analysis_id,
            }
            | Endpoint::AnalysisDelete {
                project,
                analysis_id,
            } => format!(
                "projects/{}/analysis/{}/",
                project_segment(project)?,
                analysis_segment(analysis_id)?
            ),
            Endpoint::AnalysisFilter { project } => {
                format!("projects/{}/analysis/", project_segment(project)?)
            }
            Endpoint::AnalysisCreate { project, test } => {
                let project = project_segment(project)?;
                if test {
                    format!("projects/{project}/analysis/test/")
                } else {
                    format!("projects/{project}/analysis/")
                }
            }
            Endpoint::AnalysisUpdate {
                project,
                analysis_id,
                test,
            } => {
                let project = project_segment(project)?;
                let analysis_id = analysis_segment(analysis_id)?;
                if test {
                    format!("projects/{project}/analysis/test/{analysis_id}/")
                } else {
                    format!("projects/{project}/analysis/{analysis_id}/")
                }
            }
            Endpoint::AnalysisHistory {
                project,
                analysis_id,
            } => format!(
                "projects/{}/analysis/history/{}/",
                project_segment(project)?,
                analysis_segment(analysis_id)?
            ),
            Endpoint::Register => "accounts/register/".to_string(),
            Endpoint::Login => "accounts/login/".to_string(),
            Endpoint::Logout => "accounts/logout/".to_string(),
            Endpoint::LogoutAll => "accounts/logoutall/".to_string(),
            Endpoint::Profile => "accounts/profile/".to_string(),
            Endpoint::Activity => "accounts/activity/".to_string(),
            Endpoint::Waiting => "accounts/waiting/".to_string(),
            Endpoint::Approve { username } => {
                format!("accounts/approve/{}/", segment("username", username, &[])?)
            }
            Endpoint::SiteUsers => "accounts/site/".to_string(),
            Endpoint::AllUsers => "accounts/all/".to_string(),
        };

        Ok(format!("{base}/{path}"))
    }
}

fn project_segment(value: &str) -> Result<String> {
    segment("project", value, PROJECT_CLASHES)
}

fn record_segment(value: &str) -> Result<String> {
    segment("cairn_id", value, RECORD_ID_CLASHES)
}

fn analysis_segment(value: &str) -> Result<String> {
    segment("analysis_id", value, ANALYSIS_ID_CLASHES)
}

fn segment(name: &str, value: &str, clashes: &[&str]) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!(
            "argument '{name}' was not provided"
        )));
    }
    for forbidden in ['/', '?'] {
        if value.contains(forbidden) {
            return Err(Error::Validation(format!(
                "argument '{name}' contains invalid character: '{forbidden}'"
            )));
        }
    }
    if clashes.contains(&value) {
        return Err(Error::Validation(format!(
            "argument '{name}' cannot have value '{value}': this creates a URL that resolves to a different endpoint"
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "https://cairn.example";

    #[test]
    fn joins_with_and_without_trailing_slash() {
        let plain = Endpoint::Filter { project: "proj" }.url(DOMAIN).unwrap();
        let trailing = Endpoint::Filter { project: "proj" }
            .url("https://cairn.example/")
            .unwrap();
        assert_eq!(plain, "https://cairn.example/projects/proj/");
        assert_eq!(trailing, plain);
    }

    #[test]
    fn record_routes() {
        assert_eq!(
            Endpoint::Get {
                project: "proj",
                cairn_id: "C-123"
            }
            .url(DOMAIN)
            .unwrap(),
            "https://cairn.example/projects/proj/C-123/"
        );
        assert_eq!(
            Endpoint::Query { project: "proj" }.url(DOMAIN).unwrap(),
            "https://cairn.example/projects/proj/query/"
        );
        assert_eq!(
            Endpoint::History {
                project: "proj",
                cairn_id: "C-123"
            }
            .url(DOMAIN)
            .unwrap(),
            "https://cairn.example/projects/proj/history/C-123/"
        );
    }

    #[test]
    fn test_variants_route_to_dry_run_paths() {
        assert_eq!(
            Endpoint::Create {
                project: "proj",
                test: true
            }
            .url(DOMAIN)
            .unwrap(),
            "https://cairn.example/projects/proj/test/"
        );
        assert_eq!(
            Endpoint::Update {
                project: "proj",
                cairn_id: "C-123",
                test: true
            }
            .url(DOMAIN)
            .unwrap(),
            "https://cairn.example/projects/proj/test/C-123/"
        );
    }

    #[test]
    fn analysis_routes() {
        assert_eq!(
            Endpoint::AnalysisFilter { project: "proj" }.url(DOMAIN).unwrap(),
            "https://cairn.example/projects/proj/analysis/"
        );
        assert_eq!(
            Endpoint::AnalysisUpdate {
                project: "proj",
                analysis_id: "A-9",
                test: false
            }
            .url(DOMAIN)
            .unwrap(),
            "https://cairn.example/projects/proj/analysis/A-9/"
        );
    }

    #[test]
    fn rejects_missing_or_blank_parameters() {
        assert!(matches!(
            Endpoint::Filter { project: "  " }.url(DOMAIN),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            Endpoint::Projects.url(""),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn rejects_path_breaking_characters() {
        for bad in ["a/b", "a?b"] {
            assert!(matches!(
                Endpoint::Get {
                    project: "proj",
                    cairn_id: bad
                }
                .url(DOMAIN),
                Err(Error::Validation(_))
            ));
        }
    }

    #[test]
    fn rejects_values_that_resolve_to_other_endpoints() {
        for clash in PROJECT_CLASHES {
            assert!(Endpoint::Filter { project: clash }.url(DOMAIN).is_err());
        }
        for clash in RECORD_ID_CLASHES {
            assert!(Endpoint::Get {
                project: "proj",
                cairn_id: clash
            }
            .url(DOMAIN)
            .is_err());
        }
        for clash in ANALYSIS_ID_CLASHES {
            assert!(Endpoint::AnalysisGet {
                project: "proj",
                analysis_id: clash
            }
            .url(DOMAIN)
            .is_err());
        }
    }
}
