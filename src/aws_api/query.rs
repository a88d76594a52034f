use url::form_urlencoded;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// A request in the AWS Query protocol: an Action, an API version and flat
/// parameters, sent as a form encoded POST body.
#[derive(Clone, Debug)]
pub struct QueryRequest {
    action: &'static str,
    version: &'static str,
    params: Vec<(String, String)>,
}

impl QueryRequest {
    pub fn new(action: &'static str, version: &'static str) -> Self {
        Self {
            action,
            version,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn param_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn encode(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        ser.append_pair("Action", self.action);
        ser.append_pair("Version", self.version);
        for (k, v) in &self.params {
            ser.append_pair(k, v);
        }
        ser.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_escapes_json_documents() {
        let req = QueryRequest::new("CreateRole", "2010-05-08")
            .param("RoleName", "dwhRole")
            .param("AssumeRolePolicyDocument", r#"{"Version":"2012-10-17"}"#);

        assert_eq!(
            "Action=CreateRole&Version=2010-05-08&RoleName=dwhRole&AssumeRolePolicyDocument=%7B%22Version%22%3A%222012-10-17%22%7D",
            req.encode()
        );

        let decoded: Vec<(String, String)> = form_urlencoded::parse(req.encode().as_bytes())
            .into_owned()
            .collect();
        assert_eq!(
            ("AssumeRolePolicyDocument".to_string(), r#"{"Version":"2012-10-17"}"#.to_string()),
            decoded[3]
        );
    }

    #[test]
    fn test_optional_params() {
        let req = QueryRequest::new("DescribeClusters", "2012-12-01")
            .param_opt("ClusterIdentifier", Some("dwh"))
            .param_opt("Marker", None);

        assert_eq!("DescribeClusters", req.action());
        assert_eq!(Some("dwh"), req.get("ClusterIdentifier"));
        assert_eq!(None, req.get("Marker"));
        assert_eq!(
            "Action=DescribeClusters&Version=2012-12-01&ClusterIdentifier=dwh",
            req.encode()
        );
    }
}
