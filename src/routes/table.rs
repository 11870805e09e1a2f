//! Explicit route table: (verb, path template) → (action, entity, projection, path scope).
//! Checked against the schema once at startup, before the router is built.

use crate::config::{EntityKind, Schema};
use crate::error::ConfigError;
use crate::views::Projection;
use axum::routing::MethodFilter;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write as _;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Patch => MethodFilter::PATCH,
            Verb::Delete => MethodFilter::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Replace,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Create => "create",
            Action::Retrieve => "retrieve",
            Action::Replace => "replace",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Actions addressing one row by `:id`.
    pub fn is_item(self) -> bool {
        matches!(self, Action::Retrieve | Action::Replace | Action::Update | Action::Delete)
    }
}

/// Parent key captured from the path and applied to `column`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scope {
    pub param: &'static str,
    pub column: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub action: Action,
    pub entity: EntityKind,
    pub projection: Projection,
    pub scope: Option<Scope>,
}

#[derive(Clone, Debug)]
pub struct Route {
    pub verb: Verb,
    pub template: String,
    pub endpoint: Endpoint,
}

#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Every inventory endpoint, relative to `/api/v1`.
    pub fn forestry() -> Self {
        use EntityKind::*;
        let mut table = RouteTable::default();
        table.resource(Project, "projects", Projection::Flat, Projection::Detail);
        table.nested("projects", Stand, "stands", "project_id", Projection::Flat);
        table.nested("projects", SampleDesign, "sample-designs", "project_id", Projection::Flat);
        table.resource(SampleDesign, "sample-designs", Projection::Flat, Projection::Flat);
        table.resource(Stand, "stands", Projection::Flat, Projection::Aggregated);
        table.nested("stands", Plot, "plots", "stand_id", Projection::Flat);
        table.resource(Plot, "plots", Projection::Flat, Projection::Detail);
        table.nested("plots", Tree, "trees", "plot_id", Projection::Expanded);
        table.resource(TreeReference, "tree-references", Projection::Flat, Projection::Flat);
        table.resource(Tree, "trees", Projection::Expanded, Projection::Flat);
        table
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn push(&mut self, verb: Verb, template: impl Into<String>, endpoint: Endpoint) {
        self.routes.push(Route {
            verb,
            template: template.into(),
            endpoint,
        });
    }

    /// Collection (list, create) and item (retrieve, replace, update, delete) routes.
    fn resource(&mut self, entity: EntityKind, segment: &str, list: Projection, retrieve: Projection) {
        let endpoint = |action, projection| Endpoint {
            action,
            entity,
            projection,
            scope: None,
        };
        let collection = format!("/{}", segment);
        let item = format!("/{}/:id", segment);
        self.push(Verb::Get, &collection, endpoint(Action::List, list));
        self.push(Verb::Post, &collection, endpoint(Action::Create, Projection::Flat));
        self.push(Verb::Get, &item, endpoint(Action::Retrieve, retrieve));
        self.push(Verb::Put, &item, endpoint(Action::Replace, Projection::Flat));
        self.push(Verb::Patch, &item, endpoint(Action::Update, Projection::Flat));
        self.push(Verb::Delete, &item, endpoint(Action::Delete, Projection::Flat));
    }

    /// Scoped list and nested create under a parent item. The parent key is captured as
    /// `:id` because the router allows one capture name per path position.
    fn nested(&mut self, parent: &str, entity: EntityKind, segment: &str, column: &'static str, list: Projection) {
        let scope = Some(Scope { param: "id", column });
        let template = format!("/{}/:id/{}", parent, segment);
        self.push(
            Verb::Get,
            &template,
            Endpoint {
                action: Action::List,
                entity,
                projection: list,
                scope,
            },
        );
        self.push(
            Verb::Post,
            &template,
            Endpoint {
                action: Action::Create,
                entity,
                projection: Projection::Flat,
                scope,
            },
        );
    }

    pub fn validate(&self, schema: &Schema) -> Result<(), ConfigError> {
        let param_re = Regex::new(r":([a-z_]+)").map_err(|e| ConfigError::Validation(e.to_string()))?;
        let mut seen = HashSet::new();
        for route in &self.routes {
            let name = format!("{} {}", route.verb.as_str(), route.template);
            if !seen.insert((route.verb, route.template.as_str())) {
                return Err(ConfigError::DuplicateRoute(name));
            }
            let invalid = |reason: &str| ConfigError::InvalidRoute {
                route: name.clone(),
                reason: reason.to_string(),
            };
            let ep = &route.endpoint;
            let entity = schema
                .get(ep.entity)
                .ok_or_else(|| invalid("entity is not in the schema"))?;

            let params: Vec<&str> = param_re
                .captures_iter(&route.template)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            let literal_tail = route
                .template
                .rsplit('/')
                .find(|s| !s.starts_with(':'))
                .unwrap_or_default();
            if literal_tail != entity.path_segment {
                return Err(invalid("path does not end in the entity's segment"));
            }

            if ep.action.is_item() {
                if params != ["id"] || ep.scope.is_some() {
                    return Err(invalid("item routes capture exactly :id"));
                }
            } else {
                match ep.scope {
                    None if !params.is_empty() => return Err(invalid("unscoped collection captures parameters")),
                    None => {}
                    Some(scope) => {
                        if params != [scope.param] {
                            return Err(invalid("scoped route must capture exactly its scope parameter"));
                        }
                        if !entity.column(scope.column).map_or(false, |c| c.is_owner()) {
                            return Err(invalid("scope column is not an owner key"));
                        }
                    }
                }
            }

            let writes = matches!(ep.action, Action::Create | Action::Replace | Action::Update | Action::Delete);
            if writes && ep.projection != Projection::Flat {
                return Err(invalid("writes echo the flat record"));
            }
            if ep.projection == Projection::Aggregated && ep.entity != EntityKind::Stand {
                return Err(invalid("aggregated view is only defined for stands"));
            }
            if ep.projection == Projection::Expanded && !entity.foreign_keys().any(|c| !c.is_owner()) {
                return Err(invalid("expanded view needs a reference column"));
            }
        }
        Ok(())
    }

    /// One line per route, used for startup logging.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for r in &self.routes {
            let _ = writeln!(
                out,
                "{} {} => {} {} ({})",
                r.verb.as_str(),
                r.template,
                r.endpoint.action.as_str(),
                r.endpoint.entity.label(),
                r.endpoint.projection.as_str()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::forestry_schema;
    use expect_test::expect;

    fn endpoint(action: Action, entity: EntityKind, projection: Projection) -> Endpoint {
        Endpoint {
            action,
            entity,
            projection,
            scope: None,
        }
    }

    #[test]
    fn forestry_table_is_valid() {
        RouteTable::forestry().validate(&forestry_schema()).unwrap();
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let mut table = RouteTable::forestry();
        table.push(Verb::Get, "/projects", endpoint(Action::List, EntityKind::Project, Projection::Flat));
        assert!(matches!(
            table.validate(&forestry_schema()),
            Err(ConfigError::DuplicateRoute(_))
        ));
    }

    #[test]
    fn scope_must_be_an_owner_column() {
        let mut table = RouteTable::default();
        table.push(
            Verb::Get,
            "/tree-references/:symbol/trees",
            Endpoint {
                scope: Some(Scope {
                    param: "symbol",
                    column: "symbol",
                }),
                ..endpoint(Action::List, EntityKind::Tree, Projection::Flat)
            },
        );
        let err = table.validate(&forestry_schema()).unwrap_err();
        assert!(err.to_string().contains("not an owner key"), "{err}");
    }

    #[test]
    fn item_routes_need_id() {
        let mut table = RouteTable::default();
        table.push(Verb::Get, "/plots/:plot", endpoint(Action::Retrieve, EntityKind::Plot, Projection::Flat));
        assert!(table.validate(&forestry_schema()).is_err());
    }

    #[test]
    fn aggregated_view_only_for_stands() {
        let mut table = RouteTable::default();
        table.push(Verb::Get, "/plots/:id", endpoint(Action::Retrieve, EntityKind::Plot, Projection::Aggregated));
        let err = table.validate(&forestry_schema()).unwrap_err();
        assert!(err.to_string().contains("only defined for stands"), "{err}");
    }

    #[test]
    fn route_listing() {
        expect![[r#"
            GET /projects => list project (flat)
            POST /projects => create project (flat)
            GET /projects/:id => retrieve project (detail)
            PUT /projects/:id => replace project (flat)
            PATCH /projects/:id => update project (flat)
            DELETE /projects/:id => delete project (flat)
            GET /projects/:id/stands => list stand (flat)
            POST /projects/:id/stands => create stand (flat)
            GET /projects/:id/sample-designs => list sample design (flat)
            POST /projects/:id/sample-designs => create sample design (flat)
            GET /sample-designs => list sample design (flat)
            POST /sample-designs => create sample design (flat)
            GET /sample-designs/:id => retrieve sample design (flat)
            PUT /sample-designs/:id => replace sample design (flat)
            PATCH /sample-designs/:id => update sample design (flat)
            DELETE /sample-designs/:id => delete sample design (flat)
            GET /stands => list stand (flat)
            POST /stands => create stand (flat)
            GET /stands/:id => retrieve stand (aggregated)
            PUT /stands/:id => replace stand (flat)
            PATCH /stands/:id => update stand (flat)
            DELETE /stands/:id => delete stand (flat)
            GET /stands/:id/plots => list plot (flat)
            POST /stands/:id/plots => create plot (flat)
            GET /plots => list plot (flat)
            POST /plots => create plot (flat)
            GET /plots/:id => retrieve plot (detail)
            PUT /plots/:id => replace plot (flat)
            PATCH /plots/:id => update plot (flat)
            DELETE /plots/:id => delete plot (flat)
            GET /plots/:id/trees => list tree (expanded)
            POST /plots/:id/trees => create tree (flat)
            GET /tree-references => list tree reference (flat)
            POST /tree-references => create tree reference (flat)
            GET /tree-references/:id => retrieve tree reference (flat)
            PUT /tree-references/:id => replace tree reference (flat)
            PATCH /tree-references/:id => update tree reference (flat)
            DELETE /tree-references/:id => delete tree reference (flat)
            GET /trees => list tree (expanded)
            POST /trees => create tree (flat)
            GET /trees/:id => retrieve tree (flat)
            PUT /trees/:id => replace tree (flat)
            PATCH /trees/:id => update tree (flat)
            DELETE /trees/:id => delete tree (flat)
        "#]]
        .assert_eq(&RouteTable::forestry().describe());
    }
}
