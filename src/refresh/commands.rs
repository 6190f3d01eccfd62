//! Remote script construction
//!
//! Every function here is pure: endpoint configuration, the request and
//! the resolved remote environment go in, a complete `bash` script comes
//! out. Database credentials never appear on a command line. Data Pump
//! reads them from a private parameter file, SQL*Plus from a `CONNECT`
//! inside its here-document.

use super::request::{RefreshMode, RefreshRequest};
use crate::config::{EndpointConfig, EndpointRole, RefreshSettings};
use crate::error::{ErrorCode, RefreshError, Result};
use crate::remote::environment::{EXPORTED_VARIABLES, PROFILE_PREFIX};
use crate::remote::RemoteEnvironment;
use shell_words::quote;

/// Prefix of stdout lines reporting a per-object failure that was suppressed
pub const PURGE_WARNING: &str = "PURGE-WARNING:";
pub const RECOMPILE_WARNING: &str = "RECOMPILE-WARNING:";
pub const STATS_WARNING: &str = "STATS-WARNING:";

pub const WARNING_MARKERS: [&str; 3] = [PURGE_WARNING, RECOMPILE_WARNING, STATS_WARNING];

/// Environment variable carrying the target shell password into `expect`
pub const TRANSFER_SECRET_VAR: &str = "REFRESH_TRANSFER_SECRET";

const SQL_EOF: &str = "PDB_REFRESH_SQL";
const PARFILE_EOF: &str = "PDB_REFRESH_PARFILE";
const EXPECT_EOF: &str = "PDB_REFRESH_EXPECT";

/// Object types the generic drop loop skips; tables have their own loop
const PURGE_SKIPPED_TYPES: [&str; 9] = [
    "TABLE",
    "INDEX",
    "TABLE PARTITION",
    "INDEX PARTITION",
    "TABLE SUBPARTITION",
    "INDEX SUBPARTITION",
    "LOB",
    "LOB PARTITION",
    "PACKAGE BODY",
];

/// Profile sourcing plus explicit exports of the resolved toolchain variables
pub fn environment_prefix(env: &RemoteEnvironment) -> String {
    let mut prefix = String::from(PROFILE_PREFIX);
    prefix.push('\n');
    for key in EXPORTED_VARIABLES {
        prefix.push_str(&format!("export {}={}\n", key, quote(env.get(key))));
    }
    prefix
}

fn sql_literal_list(schemas: &[String]) -> String {
    schemas
        .iter()
        .map(|s| format!("'{}'", s))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds the scripts for one run
pub struct CommandBuilder<'a> {
    source: &'a EndpointConfig,
    target: &'a EndpointConfig,
    request: &'a RefreshRequest,
    settings: &'a RefreshSettings,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(
        source: &'a EndpointConfig,
        target: &'a EndpointConfig,
        request: &'a RefreshRequest,
        settings: &'a RefreshSettings,
    ) -> Self {
        Self {
            source,
            target,
            request,
            settings,
        }
    }

    fn endpoint(&self, role: EndpointRole) -> &'a EndpointConfig {
        match role {
            EndpointRole::Source => self.source,
            EndpointRole::Target => self.target,
        }
    }

    fn connect_string(&self, role: EndpointRole) -> Result<String> {
        self.endpoint(role).db_connect_string().ok_or_else(|| {
            RefreshError::config_with_code(
                ErrorCode::CONFIG_MISSING_SECRET,
                format!("no database password for {}", role.section()),
            )
        })
    }

    fn mode_clause(&self) -> String {
        match self.request.mode() {
            RefreshMode::Full => "full=y".to_string(),
            RefreshMode::Schema => format!("schemas={}", self.request.schemas().join(",")),
        }
    }

    /// Private parameter file holding `userid`, removed when the script exits
    fn parfile_setup(&self, role: EndpointRole) -> Result<String> {
        Ok(format!(
            "umask 077\n\
             PARFILE=$(mktemp /tmp/pdb_refresh_{token}_XXXXXX) || exit 1\n\
             trap 'rm -f \"$PARFILE\"' EXIT\n\
             cat > \"$PARFILE\" <<'{eof}'\n\
             userid={userid}\n\
             {eof}\n",
            token = self.request.token(),
            eof = PARFILE_EOF,
            userid = self.connect_string(role)?,
        ))
    }

    /// SQL*Plus session running `body` as the endpoint's database user
    fn sqlplus(&self, role: EndpointRole, preamble: &str, body: &str) -> Result<String> {
        Ok(format!(
            "sqlplus -s /nolog <<'{eof}'\n\
             {preamble}\
             CONNECT {connect}\n\
             {body}\
             EXIT\n\
             {eof}\n",
            eof = SQL_EOF,
            preamble = preamble,
            connect = self.connect_string(role)?,
            body = body,
        ))
    }

    fn wrap(&self, env: &RemoteEnvironment, body: &str) -> String {
        format!("{}{}", environment_prefix(env), body)
    }

    /// expdp on the source into the source directory object
    pub fn export(&self, env: &RemoteEnvironment) -> Result<String> {
        let mut args = vec![
            "expdp parfile=\"$PARFILE\"".to_string(),
            format!("directory={}", quote(&self.source.dir_name)),
            format!("dumpfile={}", self.request.dump_file()),
            format!("logfile={}", self.request.export_log()),
            format!("parallel={}", self.settings.parallel),
        ];
        if self.settings.flashback_consistent {
            args.push("flashback_time=systimestamp".to_string());
        }
        args.push(self.mode_clause());

        let body = format!(
            "{setup}cd {dir} || exit 1\n{command} < /dev/null\n",
            setup = self.parfile_setup(EndpointRole::Source)?,
            dir = quote(&self.source.dir_path),
            command = args.join(" "),
        );
        Ok(self.wrap(env, &body))
    }

    /// Fails unless the dump file exists on the source and is non-empty
    pub fn verify_dump(&self, env: &RemoteEnvironment) -> String {
        let path = self.source.dir_file(&self.request.dump_file());
        let body = format!(
            "test -s {path} || {{ echo \"dump file {path} is missing or empty\" >&2; exit 1; }}\n",
            path = quote(&path),
        );
        self.wrap(env, &body)
    }

    /// Runs on the source and copies the dump to the target directory
    ///
    /// With a target shell password the copy is driven by `expect`, which
    /// answers the host key and password prompts. The password reaches
    /// `expect` through its environment only.
    pub fn transfer(&self, env: &RemoteEnvironment) -> String {
        let dump = self.request.dump_file();
        let destination = format!(
            "{}@{}:{}",
            self.target.ssh_user,
            self.target.host,
            self.target.dir_file(&dump)
        );
        let scp = |options: &str| {
            format!(
                "scp {}-P {} -o StrictHostKeyChecking=accept-new {} {}",
                options,
                self.target.port,
                quote(&self.source.dir_file(&dump)),
                quote(&destination)
            )
        };

        let stage = format!(
            "cd {} || exit 1\nchmod 644 {} || exit 1\n",
            quote(&self.source.dir_path),
            quote(&dump)
        );

        let copy = match &self.target.ssh_password {
            None => format!("{} < /dev/null\n", scp("-B -o BatchMode=yes ")),
            Some(password) => format!(
                "umask 077\n\
                 SCRIPT=/tmp/refresh_transfer_{token}.exp\n\
                 cat > \"$SCRIPT\" <<'{eof}'\n\
                 set timeout -1\n\
                 spawn {scp}\n\
                 expect {{\n\
                 \x20   -re \"yes/no\" {{ send \"yes\\r\"; exp_continue }}\n\
                 \x20   -re \"(?i)password:\" {{ send \"$env({var})\\r\"; exp_continue }}\n\
                 \x20   eof\n\
                 }}\n\
                 catch wait result\n\
                 exit [lindex $result 3]\n\
                 {eof}\n\
                 {var}={secret} expect \"$SCRIPT\" < /dev/null\n\
                 STATUS=$?\n\
                 rm -f \"$SCRIPT\"\n\
                 exit $STATUS\n",
                token = self.request.token(),
                eof = EXPECT_EOF,
                scp = scp(""),
                var = TRANSFER_SECRET_VAR,
                secret = quote(password.expose()),
            ),
        };

        self.wrap(env, &format!("{}{}", stage, copy))
    }

    /// Makes the transferred dump readable on the target
    pub fn target_permissions(&self, env: &RemoteEnvironment) -> String {
        let path = self.target.dir_file(&self.request.dump_file());
        self.wrap(env, &format!("chmod 644 {}\n", quote(&path)))
    }

    /// Spools statements recreating the grants, tablespaces and quotas of `schema`
    pub fn grant_backup(&self, env: &RemoteEnvironment, schema: &str) -> Result<String> {
        let spool = self.target.dir_file(&self.request.grants_file(schema));
        let body = format!(
            "SET PAGESIZE 0 FEEDBACK OFF VERIFY OFF HEADING OFF ECHO OFF TRIMSPOOL ON LINESIZE 1000\n\
             SPOOL {spool}\n\
             SELECT 'GRANT ' || granted_role || ' TO ' || grantee || DECODE(admin_option, 'YES', ' WITH ADMIN OPTION') || ';' FROM dba_role_privs WHERE grantee = '{s}';\n\
             SELECT 'GRANT ' || privilege || ' TO ' || grantee || DECODE(admin_option, 'YES', ' WITH ADMIN OPTION') || ';' FROM dba_sys_privs WHERE grantee = '{s}';\n\
             SELECT 'GRANT ' || privilege || ' ON ' || owner || '.' || table_name || ' TO ' || grantee || DECODE(grantable, 'YES', ' WITH GRANT OPTION') || ';' FROM dba_tab_privs WHERE grantee = '{s}';\n\
             SELECT 'ALTER USER ' || username || ' DEFAULT TABLESPACE ' || default_tablespace || ' TEMPORARY TABLESPACE ' || temporary_tablespace || ';' FROM dba_users WHERE username = '{s}';\n\
             SELECT 'ALTER USER ' || username || ' QUOTA ' || DECODE(max_bytes, -1, 'UNLIMITED', ROUND(max_bytes / 1024 / 1024) || 'M') || ' ON ' || tablespace_name || ';' FROM dba_ts_quotas WHERE username = '{s}';\n\
             SPOOL OFF\n",
            spool = spool,
            s = schema,
        );
        let script = self.sqlplus(EndpointRole::Target, "WHENEVER SQLERROR EXIT FAILURE\n", &body)?;
        Ok(self.wrap(env, &script))
    }

    /// Drops every object owned by `schema`, reporting each failed drop
    pub fn purge(&self, env: &RemoteEnvironment, schema: &str) -> Result<String> {
        let skipped = PURGE_SKIPPED_TYPES
            .iter()
            .map(|t| format!("'{}'", t))
            .collect::<Vec<_>>()
            .join(", ");

        let body = format!(
            "SET SERVEROUTPUT ON SIZE UNLIMITED FEEDBACK OFF\n\
             BEGIN\n\
             \x20 FOR t IN (SELECT table_name FROM dba_tables WHERE owner = '{s}' AND nested = 'NO') LOOP\n\
             \x20   BEGIN\n\
             \x20     EXECUTE IMMEDIATE 'DROP TABLE \"{s}\".\"' || t.table_name || '\" CASCADE CONSTRAINTS PURGE';\n\
             \x20   EXCEPTION\n\
             \x20     WHEN OTHERS THEN\n\
             \x20       DBMS_OUTPUT.PUT_LINE('{marker} TABLE {s}.' || t.table_name || ': ' || SQLERRM);\n\
             \x20   END;\n\
             \x20 END LOOP;\n\
             \x20 FOR o IN (SELECT object_name, object_type FROM dba_objects\n\
             \x20           WHERE owner = '{s}' AND object_type NOT IN ({skipped})) LOOP\n\
             \x20   BEGIN\n\
             \x20     EXECUTE IMMEDIATE 'DROP ' || o.object_type || ' \"{s}\".\"' || o.object_name || '\"'\n\
             \x20       || CASE WHEN o.object_type = 'TYPE' THEN ' FORCE' END;\n\
             \x20   EXCEPTION\n\
             \x20     WHEN OTHERS THEN\n\
             \x20       DBMS_OUTPUT.PUT_LINE('{marker} ' || o.object_type || ' {s}.' || o.object_name || ': ' || SQLERRM);\n\
             \x20   END;\n\
             \x20 END LOOP;\n\
             END;\n\
             /\n\
             PURGE RECYCLEBIN;\n",
            s = schema,
            marker = PURGE_WARNING,
            skipped = skipped,
        );
        let script = self.sqlplus(EndpointRole::Target, "WHENEVER SQLERROR EXIT FAILURE\n", &body)?;
        Ok(self.wrap(env, &script))
    }

    /// impdp on the target, replacing existing tables
    ///
    /// Users, role grants and quotas are excluded; the grant backup and
    /// restore steps carry them instead.
    pub fn import(&self, env: &RemoteEnvironment) -> Result<String> {
        let args = [
            "impdp parfile=\"$PARFILE\"".to_string(),
            format!("directory={}", quote(&self.target.dir_name)),
            format!("dumpfile={}", self.request.dump_file()),
            format!("logfile={}", self.request.import_log()),
            format!("parallel={}", self.settings.parallel),
            "table_exists_action=replace".to_string(),
            "transform=oid:n".to_string(),
            "exclude=user,role_grant,default_role,tablespace_quota".to_string(),
            self.mode_clause(),
        ];

        let body = format!(
            "{setup}cd {dir} || exit 1\n{command} < /dev/null\n",
            setup = self.parfile_setup(EndpointRole::Target)?,
            dir = quote(&self.target.dir_path),
            command = args.join(" "),
        );
        Ok(self.wrap(env, &body))
    }

    /// Replays the grants spooled for `schema` earlier in this run
    pub fn grant_restore(&self, env: &RemoteEnvironment, schema: &str) -> Result<String> {
        let grants = self.target.dir_file(&self.request.grants_file(schema));
        let check = format!(
            "if [ ! -f {path} ]; then echo \"grant file {path} not found\" >&2; exit 1; fi\n",
            path = quote(&grants),
        );
        let script = self.sqlplus(
            EndpointRole::Target,
            "",
            &format!("SET FEEDBACK OFF\n@{}\n", grants),
        )?;
        Ok(self.wrap(env, &format!("{}{}", check, script)))
    }

    /// Recompiles invalid objects and gathers statistics for every refreshed schema
    pub fn post_refresh(&self, env: &RemoteEnvironment) -> Result<String> {
        let owners = sql_literal_list(self.request.schemas());
        let body = format!(
            "SET SERVEROUTPUT ON SIZE UNLIMITED FEEDBACK OFF\n\
             BEGIN\n\
             \x20 FOR o IN (SELECT owner, object_name, object_type FROM dba_objects\n\
             \x20           WHERE status = 'INVALID' AND owner IN ({owners})) LOOP\n\
             \x20   BEGIN\n\
             \x20     IF o.object_type IN ('PACKAGE BODY', 'TYPE BODY') THEN\n\
             \x20       EXECUTE IMMEDIATE 'ALTER ' || REPLACE(o.object_type, ' BODY') || ' \"' || o.owner || '\".\"' || o.object_name || '\" COMPILE BODY';\n\
             \x20     ELSE\n\
             \x20       EXECUTE IMMEDIATE 'ALTER ' || o.object_type || ' \"' || o.owner || '\".\"' || o.object_name || '\" COMPILE';\n\
             \x20     END IF;\n\
             \x20   EXCEPTION\n\
             \x20     WHEN OTHERS THEN\n\
             \x20       DBMS_OUTPUT.PUT_LINE('{recompile} ' || o.object_type || ' ' || o.owner || '.' || o.object_name || ': ' || SQLERRM);\n\
             \x20   END;\n\
             \x20 END LOOP;\n\
             \x20 FOR u IN (SELECT username FROM dba_users WHERE username IN ({owners})) LOOP\n\
             \x20   BEGIN\n\
             \x20     DBMS_STATS.GATHER_SCHEMA_STATS(ownname => u.username, options => 'GATHER AUTO', degree => DBMS_STATS.AUTO_DEGREE);\n\
             \x20   EXCEPTION\n\
             \x20     WHEN OTHERS THEN\n\
             \x20       DBMS_OUTPUT.PUT_LINE('{stats} ' || u.username || ': ' || SQLERRM);\n\
             \x20   END;\n\
             \x20 END LOOP;\n\
             END;\n\
             /\n",
            owners = owners,
            recompile = RECOMPILE_WARNING,
            stats = STATS_WARNING,
        );
        let script = self.sqlplus(EndpointRole::Target, "WHENEVER SQLERROR EXIT FAILURE\n", &body)?;
        Ok(self.wrap(env, &script))
    }
}

/// Lines of `stdout` carrying a suppressed-error marker, marker stripped
pub fn marker_warnings(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            WARNING_MARKERS
                .iter()
                .find(|marker| line.starts_with(*marker))
                .map(|marker| line[marker.len()..].trim().to_string())
        })
        .collect()
}

/// `ORA-`/`SP2-` error lines SQL*Plus printed to stdout
pub fn sqlplus_errors(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ORA-") || line.starts_with("SP2-"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RefreshConfig, Secret};

    struct Fixture {
        config: RefreshConfig,
        request: RefreshRequest,
        env: RemoteEnvironment,
    }

    impl Fixture {
        fn new(mode: RefreshMode, schemas: &[&str]) -> Self {
            let mut config = RefreshConfig::template();
            config.source.db_password = Some(Secret::new("Pr0d#pw"));
            config.target.db_password = Some(Secret::new("Qa@pw"));
            config.target.ssh_password = Some(Secret::new("sh'pw"));
            config.source.dir_path = "/dp/src".to_string();
            config.target.dir_path = "/dp/tgt".to_string();
            let request =
                RefreshRequest::with_token(mode, schemas.iter().copied(), "20240101_120000")
                    .unwrap();
            let env: RemoteEnvironment = [
                ("ORACLE_HOME", "/u01/app/oracle/product/19c"),
                ("PATH", "/u01/bin:/usr/bin"),
            ]
            .into_iter()
            .collect();
            Self {
                config,
                request,
                env,
            }
        }

        fn builder(&self) -> CommandBuilder<'_> {
            CommandBuilder::new(
                &self.config.source,
                &self.config.target,
                &self.request,
                &self.config.refresh,
            )
        }
    }

    #[test]
    fn test_prefix_exports_all_variables() {
        let fx = Fixture::new(RefreshMode::Full, &[]);
        let prefix = environment_prefix(&fx.env);
        assert!(prefix.starts_with(PROFILE_PREFIX));
        assert!(prefix.contains("export ORACLE_HOME=/u01/app/oracle/product/19c\n"));
        assert!(prefix.contains("export TNS_ADMIN=''\n"));
        assert!(prefix.contains("export LD_LIBRARY_PATH=''\n"));
    }

    #[test]
    fn test_export_full_mode() {
        let fx = Fixture::new(RefreshMode::Full, &[]);
        let script = fx.builder().export(&fx.env).unwrap();

        assert!(script.contains("cd /dp/src || exit 1"));
        assert!(script.contains(
            "expdp parfile=\"$PARFILE\" directory=DATA_PUMP_DIR dumpfile=refresh_20240101_120000.dmp \
             logfile=export_20240101_120000.log parallel=2 flashback_time=systimestamp full=y < /dev/null"
        ));
        assert!(script.contains("userid=system/\"Pr0d#pw\"@PRODPDB"));
        assert!(script.contains("trap 'rm -f \"$PARFILE\"' EXIT"));
    }

    #[test]
    fn test_credentials_never_on_tool_command_line() {
        let fx = Fixture::new(RefreshMode::Schema, &["APP"]);
        let builder = fx.builder();
        for script in [
            builder.export(&fx.env).unwrap(),
            builder.import(&fx.env).unwrap(),
            builder.purge(&fx.env, "APP").unwrap(),
        ] {
            for line in script.lines() {
                if line.starts_with("expdp") || line.starts_with("impdp") || line.starts_with("sqlplus") {
                    assert!(!line.contains("pw"), "{line}");
                }
            }
        }
    }

    #[test]
    fn test_import_schema_mode() {
        let fx = Fixture::new(RefreshMode::Schema, &["APP", "RPT"]);
        let script = fx.builder().import(&fx.env).unwrap();
        assert!(script.contains("cd /dp/tgt || exit 1"));
        assert!(script.contains("table_exists_action=replace"));
        assert!(script.contains("exclude=user,role_grant,default_role,tablespace_quota"));
        assert!(script.contains("logfile=import_20240101_120000.log"));
        assert!(script.contains("schemas=APP,RPT < /dev/null"));
        assert!(script.contains("userid=system/\"Qa@pw\"@QAPDB"));
    }

    #[test]
    fn test_export_without_flashback() {
        let mut fx = Fixture::new(RefreshMode::Schema, &["APP"]);
        fx.config.refresh.flashback_consistent = false;
        fx.config.refresh.parallel = 8;
        let script = fx.builder().export(&fx.env).unwrap();
        assert!(!script.contains("flashback_time"));
        assert!(script.contains("parallel=8 schemas=APP"));
    }

    #[test]
    fn test_grant_backup_spools_to_run_file() {
        let fx = Fixture::new(RefreshMode::Schema, &["APP"]);
        let script = fx.builder().grant_backup(&fx.env, "APP").unwrap();
        assert!(script.contains("sqlplus -s /nolog <<'PDB_REFRESH_SQL'"));
        assert!(script.contains("CONNECT system/\"Qa@pw\"@QAPDB"));
        assert!(script.contains("SPOOL /dp/tgt/qa_APP_grants_20240101_120000.sql"));
        for view in ["dba_role_privs", "dba_sys_privs", "dba_tab_privs", "dba_users", "dba_ts_quotas"] {
            assert!(script.contains(view), "{view}");
        }
    }

    #[test]
    fn test_purge_reports_suppressed_errors() {
        let fx = Fixture::new(RefreshMode::Schema, &["APP"]);
        let script = fx.builder().purge(&fx.env, "APP").unwrap();
        assert!(script.contains("CASCADE CONSTRAINTS PURGE"));
        assert!(script.contains("WHERE owner = 'APP'"));
        assert!(script.contains("'TABLE PARTITION'"));
        assert!(script.contains("PURGE-WARNING:"));
        assert!(script.contains("PURGE RECYCLEBIN;"));
        assert!(script.contains("' FORCE'"));
    }

    #[test]
    fn test_grant_restore_checks_file() {
        let fx = Fixture::new(RefreshMode::Schema, &["APP"]);
        let script = fx.builder().grant_restore(&fx.env, "APP").unwrap();
        assert!(script.contains("if [ ! -f /dp/tgt/qa_APP_grants_20240101_120000.sql ]"));
        assert!(script.contains("@/dp/tgt/qa_APP_grants_20240101_120000.sql"));
    }

    #[test]
    fn test_post_refresh_covers_all_schemas() {
        let fx = Fixture::new(RefreshMode::Schema, &["APP", "RPT"]);
        let script = fx.builder().post_refresh(&fx.env).unwrap();
        assert_eq!(script.matches("owner IN ('APP', 'RPT')").count(), 1);
        assert!(script.contains("username IN ('APP', 'RPT')"));
        assert!(script.contains("COMPILE BODY"));
        assert!(script.contains("DBMS_STATS.AUTO_DEGREE"));
        assert!(script.contains("'GATHER AUTO'"));
    }

    #[test]
    fn test_transfer_with_password_uses_expect_env() {
        let fx = Fixture::new(RefreshMode::Full, &[]);
        let script = fx.builder().transfer(&fx.env);
        assert!(script.contains("chmod 644 refresh_20240101_120000.dmp"));
        assert!(script.contains(
            "spawn scp -P 22 -o StrictHostKeyChecking=accept-new /dp/src/refresh_20240101_120000.dmp \
             oracle@qa-db.example.com:/dp/tgt/refresh_20240101_120000.dmp"
        ));
        assert!(script.contains("$env(REFRESH_TRANSFER_SECRET)"));
        assert!(script.contains("REFRESH_TRANSFER_SECRET='sh'\\''pw' expect"));
        assert!(script.contains("rm -f \"$SCRIPT\""));
        assert!(!script.contains("spawn scp -P 22 sh'pw"));
    }

    #[test]
    fn test_transfer_with_keys_uses_batch_scp() {
        let mut fx = Fixture::new(RefreshMode::Full, &[]);
        fx.config.target.ssh_password = None;
        let script = fx.builder().transfer(&fx.env);
        assert!(!script.contains("expect"));
        assert!(script.contains("scp -B -o BatchMode=yes -P 22 -o StrictHostKeyChecking=accept-new"));
        assert!(script.contains("/dp/tgt/refresh_20240101_120000.dmp < /dev/null"));
    }

    #[test]
    fn test_verify_dump_and_permissions() {
        let fx = Fixture::new(RefreshMode::Full, &[]);
        let builder = fx.builder();
        assert!(builder
            .verify_dump(&fx.env)
            .contains("test -s /dp/src/refresh_20240101_120000.dmp"));
        assert!(builder
            .target_permissions(&fx.env)
            .ends_with("chmod 644 /dp/tgt/refresh_20240101_120000.dmp\n"));
    }

    #[test]
    fn test_missing_password_is_config_error() {
        let mut fx = Fixture::new(RefreshMode::Full, &[]);
        fx.config.source.db_password = None;
        let err = fx.builder().export(&fx.env).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_MISSING_SECRET);
    }

    #[test]
    fn test_marker_warnings() {
        let stdout = "PURGE-WARNING: TABLE APP.T1: ORA-00054: resource busy\n\
                      noise\n  RECOMPILE-WARNING: VIEW APP.V: ORA-00942\n";
        assert_eq!(
            marker_warnings(stdout),
            vec![
                "TABLE APP.T1: ORA-00054: resource busy",
                "VIEW APP.V: ORA-00942"
            ]
        );
    }

    #[test]
    fn test_sqlplus_errors() {
        let stdout = "GRANT done\nORA-01917: user or role 'X' does not exist\nSP2-0310: unable to open file\n";
        assert_eq!(sqlplus_errors(stdout).len(), 2);
    }
}
