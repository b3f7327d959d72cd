//! CAS 2.0 `/serviceValidate`: an XML `serviceResponse` with the user and its attributes.

use roxmltree::{Document, Node};

use crate::backchannel::Backchannel;
use crate::error::{CasError, Result};
use crate::identity::IdentityBuilder;
use crate::options::CasAuthenticationOptions;
use crate::properties::AuthenticationProperties;

use super::AuthenticationTicket;

pub const CAS_NAMESPACE: &str = "http://www.yale.edu/tp/cas";

/// Content of an `authenticationSuccess` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceValidation {
    pub user: String,
    /// Attribute local names and values, in document order.
    pub attributes: Vec<(String, String)>,
}

pub async fn validate(
    options: &CasAuthenticationOptions,
    backchannel: &dyn Backchannel,
    ticket: &str,
    service: &str,
    properties: AuthenticationProperties,
) -> Result<AuthenticationTicket> {
    let url = super::validation_url(options, "serviceValidate", service, ticket);
    let body = backchannel.get(&url).await?;

    let Some(validation) = parse_response(&body)? else {
        return Ok(AuthenticationTicket::rejected(properties));
    };

    let mut builder = IdentityBuilder::new(&options.authentication_type, &options.name_claim_type, validation.user)
        .name_identifier_attribute(options.name_identifier_attribute.as_deref());
    for (name, value) in validation.attributes {
        builder = builder.attribute(name, value);
    }
    let identity = builder.build()?;

    Ok(super::authenticated(options, identity, properties).await)
}

/// `Ok(None)` when the server refused the ticket, `Err` when the body isn't a CAS answer.
pub fn parse_response(body: &str) -> Result<Option<ServiceValidation>> {
    let doc = Document::parse(body)?;
    let root = doc.root_element();
    if !root.has_tag_name((CAS_NAMESPACE, "serviceResponse")) {
        return Err(CasError::UnexpectedResponse(format!(
            "root element is <{}>, expected cas:serviceResponse",
            root.tag_name().name()
        )));
    }

    let Some(success) = child(root, "authenticationSuccess") else {
        if let Some(failure) = child(root, "authenticationFailure") {
            let reason = element_text(failure);
            tracing::debug!(
                code = failure.attribute("code").unwrap_or_default(),
                reason = reason.trim(),
                "CAS 2.0 ticket rejected"
            );
        }
        return Ok(None);
    };

    let user = child(success, "user").map(element_text).unwrap_or_default();
    let user = user.trim();
    if user.is_empty() {
        return Ok(None);
    }

    let attributes = child(success, "attributes")
        .map(|attributes| {
            attributes
                .children()
                .filter(Node::is_element)
                .map(|attribute| (attribute.tag_name().name().to_string(), element_text(attribute)))
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(ServiceValidation { user: user.to_string(), attributes }))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name((CAS_NAMESPACE, name)))
}

fn element_text(node: Node<'_, '_>) -> String {
    node.descendants().filter(Node::is_text).filter_map(|n| n.text()).collect()
}
